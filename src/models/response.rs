// src/models/response.rs

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Represents the 'responses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub survey_id: Uuid,

    /// Answers denormalized with the question labels at submission time.
    pub answers: Json<ResponseAnswers>,

    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Answer payload keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnswers {
    pub ratings: BTreeMap<Uuid, FormattedAnswer>,
    pub weights: BTreeMap<Uuid, FormattedAnswer>,
}

/// A numeric answer together with the label it answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedAnswer {
    pub value: f64,
    pub text: String,
}

/// Response row handed to the store.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub survey_id: Uuid,
    pub answers: ResponseAnswers,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// DTO posted by a respondent: every weight and rating in one go.
#[derive(Debug, Deserialize)]
pub struct SubmitResponseRequest {
    #[serde(default)]
    pub weights: HashMap<Uuid, f64>,
    #[serde(default)]
    pub ratings: HashMap<Uuid, f64>,
}

/// Returned once a response is stored and its key redeemed.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub response_id: Uuid,
    pub survey_id: Uuid,
    pub total_points: f64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub is_submitted: bool,
}
