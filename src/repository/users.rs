use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserJobPreferences;

/// Read-only view over the externally-owned user records; the matcher only
/// ever needs the preference projection.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn preferences(&self, user_id: Uuid) -> Result<Option<UserJobPreferences>, AppError>;
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn preferences(&self, user_id: Uuid) -> Result<Option<UserJobPreferences>, AppError> {
        let row = sqlx::query("SELECT skills, experience_years, location FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let location: String = row.get("location");
            UserJobPreferences {
                skills: row.get("skills"),
                experience_years: row.get::<i32, _>("experience_years").max(0) as u32,
                preferred_locations: if location.is_empty() {
                    Vec::new()
                } else {
                    vec![location]
                },
            }
        }))
    }
}
