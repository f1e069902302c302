use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Processing state of a CV job. Transitions are monotone:
/// `Pending -> Processing -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cv_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CvStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CvStatus {
    /// Whether moving from `self` to `next` respects the state machine.
    pub fn can_transition_to(self, next: CvStatus) -> bool {
        matches!(
            (self, next),
            (CvStatus::Pending, CvStatus::Processing)
                | (CvStatus::Processing, CvStatus::Completed)
                | (CvStatus::Processing, CvStatus::Failed)
        )
    }
}

/// A CV processing job and, once completed, its parsed results.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Opaque object-store handle; decoded only by the storage module.
    pub file_ref: String,
    pub file_name: String,
    pub status: CvStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_summary: Option<String>,
    #[sqlx(json)]
    pub experiences: Vec<Experience>,
    #[sqlx(json)]
    pub educations: Vec<Education>,
    pub skills: Vec<String>,
    #[sqlx(json)]
    pub suggestions: Vec<Suggestion>,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Results attached to a CV record when processing completes.
#[derive(Debug, Clone, Default)]
pub struct CvResults {
    pub raw_text: String,
    pub skills: Vec<String>,
    pub experiences: Vec<Experience>,
    pub educations: Vec<Education>,
    pub suggestions: Vec<Suggestion>,
    pub score: i32,
    /// Non-fatal warning recorded on completed runs (degraded AI,
    /// low-confidence parse).
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub id: String,
    pub degree: String,
    pub institution: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_date: Option<NaiveDate>,
}

/// Kinds of CV improvement hints the scorer understands. Anything else
/// deserializes to `Other` and is ignored by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Quantification,
    WeakActionVerbs,
    MissingKeywords,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub content: String,
    #[serde(default)]
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_monotone() {
        assert!(CvStatus::Pending.can_transition_to(CvStatus::Processing));
        assert!(CvStatus::Processing.can_transition_to(CvStatus::Completed));
        assert!(CvStatus::Processing.can_transition_to(CvStatus::Failed));

        assert!(!CvStatus::Completed.can_transition_to(CvStatus::Processing));
        assert!(!CvStatus::Failed.can_transition_to(CvStatus::Processing));
        assert!(!CvStatus::Pending.can_transition_to(CvStatus::Completed));
        assert!(!CvStatus::Processing.can_transition_to(CvStatus::Pending));
    }

    #[test]
    fn test_unknown_suggestion_kind_maps_to_other() {
        let s: Suggestion =
            serde_json::from_str(r#"{"type":"formatting","content":"tighten margins"}"#).unwrap();
        assert_eq!(s.kind, SuggestionKind::Other);
        assert!(!s.applied);
    }

    #[test]
    fn test_suggestion_kind_snake_case() {
        let s: Suggestion =
            serde_json::from_str(r#"{"type":"weak_action_verbs","content":"led, not helped"}"#)
                .unwrap();
        assert_eq!(s.kind, SuggestionKind::WeakActionVerbs);
    }
}
