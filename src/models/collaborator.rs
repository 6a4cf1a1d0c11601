// src/models/collaborator.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'collaborators' table: people surveys are usually sent to.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Unique across the directory.
    pub email: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Collaborator {
    /// Case-insensitive match against "first last email".
    pub fn matches(&self, search: &str) -> bool {
        let haystack = format!("{} {} {}", self.first_name, self.last_name, self.email);
        haystack.to_lowercase().contains(&search.to_lowercase())
    }
}

/// DTO for creating or replacing a collaborator.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CollaboratorRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be between 1 and 100 characters."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be between 1 and 100 characters."))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollaboratorQuery {
    pub search: Option<String>,
}
