// src/models/access_key.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

/// Represents the 'access_keys' table in the database.
///
/// `is_used` only ever moves from false to true, through a conditional update.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AccessKey {
    pub id: Uuid,

    /// Random token handed to the invitee.
    pub key: String,

    pub survey_id: Uuid,

    /// Invitee address. `None` for keys generated without an invitation.
    pub email: Option<String>,

    pub is_used: bool,
    pub is_sent: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Key row handed to the store.
#[derive(Debug, Clone)]
pub struct NewAccessKey {
    pub key: String,
    pub survey_id: Uuid,
    pub email: Option<String>,
}

/// Outcome of issuing a key, including whether its invitation went out.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedKey {
    #[serde(flatten)]
    pub access_key: AccessKey,
    pub invitation_sent: bool,
}

/// Status filter for key listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatusFilter {
    #[default]
    All,
    Used,
    Available,
    Sent,
}

/// Query string for key listings.
#[derive(Debug, Default, Deserialize)]
pub struct KeyListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub status: KeyStatusFilter,
}

/// Counters shown above a key listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeyStatistics {
    pub total: usize,
    pub used: usize,
    pub sent: usize,
}

#[derive(Debug, Serialize)]
pub struct KeyListResponse {
    pub keys: Vec<AccessKey>,
    pub statistics: KeyStatistics,
}

/// DTO for issuing keys to a list of invitees.
#[derive(Debug, Deserialize, Validate)]
pub struct IssueKeysRequest {
    #[validate(length(min = 1, max = 500), custom(function = validate_emails))]
    pub emails: Vec<String>,
}

fn validate_emails(emails: &[String]) -> Result<(), validator::ValidationError> {
    for email in emails {
        if !email.validate_email() {
            let mut err = validator::ValidationError::new("invalid_email");
            err.add_param("value".into(), email);
            return Err(err);
        }
    }
    Ok(())
}
