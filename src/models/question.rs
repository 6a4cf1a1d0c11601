// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'questions' table in the database.
///
/// A question carries two free-text axes. Either may be absent, which is how
/// rating-only or weight-only questions are expressed.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub survey_id: Uuid,

    /// Order of the question inside its survey.
    pub position: i32,

    /// Label describing the rating axis.
    pub rating: Option<String>,

    /// Label describing the weight axis.
    pub weighting: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for one question inside a survey creation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(max = 1000))]
    pub rating: Option<String>,
    #[validate(length(max = 1000))]
    pub weighting: Option<String>,
}

/// Question row handed to the store, already sanitized.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub position: i32,
    pub rating: Option<String>,
    pub weighting: Option<String>,
}
