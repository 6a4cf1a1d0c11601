// src/models/survey.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::DEFAULT_POINT_MULTIPLIER,
    models::{
        access_key::AccessKey,
        question::{CreateQuestionRequest, Question},
        response::SurveyResponse,
    },
};

/// Represents the 'surveys' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    pub description: String,

    /// Factor applied to every weight when computing the point total.
    pub point_multiplier: f64,

    /// At most one survey is active across the whole table.
    pub is_active: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Survey {
    /// Stored multiplier, falling back to 200/39 when it is zero or not a number.
    pub fn effective_multiplier(&self) -> f64 {
        effective_multiplier(self.point_multiplier)
    }
}

pub fn effective_multiplier(stored: f64) -> f64 {
    if stored == 0.0 || !stored.is_finite() {
        DEFAULT_POINT_MULTIPLIER
    } else {
        stored
    }
}

/// A survey with its nested collections, as the store returns it.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyDetail {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<Question>,
    pub access_keys: Vec<AccessKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses: Option<Vec<SurveyResponse>>,
}

/// List projection of a survey with counters derived from its nested rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveySummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub point_multiplier: f64,
    pub is_active: bool,
    pub question_count: usize,
    pub total_keys: usize,
    pub used_keys: usize,
    pub sent_keys: usize,
}

impl From<&SurveyDetail> for SurveySummary {
    fn from(detail: &SurveyDetail) -> Self {
        let keys = &detail.access_keys;
        Self {
            id: detail.survey.id,
            title: detail.survey.title.clone(),
            description: detail.survey.description.clone(),
            point_multiplier: detail.survey.effective_multiplier(),
            is_active: detail.survey.is_active,
            question_count: detail.questions.len(),
            total_keys: keys.len(),
            used_keys: keys.iter().filter(|k| k.is_used).count(),
            sent_keys: keys.iter().filter(|k| k.is_sent).count(),
        }
    }
}

/// What a respondent sees: no keys, no responses.
#[derive(Debug, Clone, Serialize)]
pub struct PublicSurvey {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub point_multiplier: f64,
    pub questions: Vec<Question>,
}

impl From<SurveyDetail> for PublicSurvey {
    fn from(detail: SurveyDetail) -> Self {
        Self {
            point_multiplier: detail.survey.effective_multiplier(),
            id: detail.survey.id,
            title: detail.survey.title,
            description: detail.survey.description,
            questions: detail.questions,
        }
    }
}

/// Survey row handed to the store, already sanitized.
#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub title: String,
    pub description: String,
    pub point_multiplier: f64,
}

/// DTO for creating a survey together with its questions.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSurveyRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    /// Defaults to 200/39 when omitted.
    #[validate(range(exclusive_min = 0.0, max = 1000.0))]
    pub point_multiplier: Option<f64>,
    #[validate(
        length(min = 1, max = 200, message = "A survey needs between 1 and 200 questions."),
        nested
    )]
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SurveyListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SurveyDetailQuery {
    #[serde(default)]
    pub responses: bool,
}
