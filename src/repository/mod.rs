//! Persistence capability surfaces and their PostgreSQL implementations.
//!
//! Services depend on the traits here (`JobStore`, `CvStore`,
//! `UserDirectory`), carried in `AppState` as `Arc<dyn _>` so tests can
//! substitute in-memory fakes for the concrete `Pg*` types.

pub mod cvs;
pub mod jobs;
pub mod users;

pub use cvs::{CvStore, PgCvRepository};
pub use jobs::{BulkUpsertOutcome, JobStore, PgJobRepository};
pub use users::{PgUserDirectory, UserDirectory};
