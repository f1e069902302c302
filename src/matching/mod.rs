//! Weighted job-to-user matching.
//!
//! `match_score` is a pure function over a job and a preference view:
//! skills 70%, experience 20%, location 10%, clamped to [0, 100].

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::Job;
use crate::models::user::UserJobPreferences;
use crate::repository::{JobStore, UserDirectory};

/// Jobs scoring below this are not worth recommending.
const MATCH_THRESHOLD: f64 = 30.0;

/// Computes the 0-100 fit between a job and a user's preferences.
pub fn match_score(job: &Job, prefs: &UserJobPreferences) -> f64 {
    let skills = skill_score(&job.extracted_skills, &prefs.skills);
    let experience = experience_score(&job.description, prefs.experience_years);
    let location = location_score(&job.location, &prefs.preferred_locations);

    (skills * 0.7 + experience * 0.2 + location * 0.1).clamp(0.0, 100.0)
}

/// Fraction of the user's skills present (case-insensitively) in the job's
/// extracted skills, as a percentage. No declared skills means no signal.
fn skill_score(job_skills: &[String], user_skills: &[String]) -> f64 {
    if user_skills.is_empty() {
        return 0.0;
    }
    let matched = user_skills
        .iter()
        .filter(|want| job_skills.iter().any(|have| have.eq_ignore_ascii_case(want)))
        .count();
    matched as f64 / user_skills.len() as f64 * 100.0
}

static EXPERIENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\d+)\+?\s*years?\s*of\s*experience",
        r"(\d+)\+?\s*years?\s*experience",
        r"minimum\s*(\d+)\s*years?",
        r"at least\s*(\d+)\s*years?",
        r"(\d+)\s*to\s*\d+\s*years?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Pulls the required years of experience from a job description, falling
/// back to seniority keywords. Zero means no stated requirement.
fn extract_experience_requirement(description: &str) -> u32 {
    let description = description.to_lowercase();

    for pattern in EXPERIENCE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&description) {
            if let Ok(years) = caps[1].parse::<u32>() {
                return years;
            }
        }
    }

    if description.contains("senior") || description.contains("lead") {
        5
    } else if description.contains("mid-level") || description.contains("intermediate") {
        3
    } else {
        // "junior"/"entry" and silence both mean no years requirement.
        0
    }
}

/// Scores the user's experience against what the description asks for.
fn experience_score(description: &str, user_years: u32) -> f64 {
    if user_years == 0 {
        return 50.0; // neutral for entry level
    }

    let required = extract_experience_requirement(description);
    if required == 0 {
        return 75.0;
    }

    let diff = user_years as i64 - required as i64;
    if diff >= 0 {
        match diff {
            0..=2 => 100.0,
            3..=5 => 85.0,
            _ => 70.0,
        }
    } else {
        match -diff {
            1 => 80.0,
            2..=3 => 60.0,
            _ => 30.0,
        }
    }
}

/// Remote-friendly listings and any substring overlap with a preferred
/// location are full marks; no preferences means everything fits.
fn location_score(job_location: &str, preferred: &[String]) -> f64 {
    if preferred.is_empty() {
        return 100.0;
    }

    let job_location = job_location.to_lowercase();
    if job_location.contains("remote")
        || job_location.contains("anywhere")
        || job_location.contains("worldwide")
    {
        return 100.0;
    }

    for pref in preferred {
        let pref = pref.to_lowercase();
        if job_location.contains(&pref) || pref.contains(&job_location) {
            return 100.0;
        }
    }

    20.0
}

/// Scored recommendations for a user.
pub struct MatchingService {
    jobs: Arc<dyn JobStore>,
    users: Arc<dyn UserDirectory>,
}

impl MatchingService {
    pub fn new(jobs: Arc<dyn JobStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { jobs, users }
    }

    pub async fn preferences_for(&self, user_id: Uuid) -> Result<UserJobPreferences, AppError> {
        self.users
            .preferences(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))
    }

    /// Pulls an over-fetched candidate window (newest first), scores each
    /// job, keeps those at or above the threshold, and returns the top
    /// `limit` sorted by score.
    pub async fn get_matches(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Job>, AppError> {
        let prefs = self.preferences_for(user_id).await?;
        let candidates = self.jobs.get_for_matching(limit * 2, offset).await?;

        let mut matched: Vec<Job> = candidates
            .into_iter()
            .filter_map(|mut job| {
                let score = match_score(&job, &prefs);
                if score >= MATCH_THRESHOLD {
                    job.match_score = Some(score);
                    Some(job)
                } else {
                    None
                }
            })
            .collect();

        matched.sort_by(|a, b| {
            b.match_score
                .unwrap_or(0.0)
                .total_cmp(&a.match_score.unwrap_or(0.0))
        });
        matched.truncate(limit as usize);
        Ok(matched)
    }
}
