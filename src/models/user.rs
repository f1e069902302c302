use serde::{Deserialize, Serialize};

/// Read-only view of a user's matching preferences, derived from the
/// externally-owned user record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserJobPreferences {
    pub skills: Vec<String>,
    pub experience_years: u32,
    pub preferred_locations: Vec<String>,
}
