// src/store/mod.rs

//! Persistence collaborator.
//!
//! Everything the engine needs from the relational backend goes through
//! [`SurveyStore`]. The handle is injected through [`crate::state::AppState`]
//! and the engine services; nothing looks it up from global state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    access_key::{AccessKey, NewAccessKey},
    collaborator::{Collaborator, CollaboratorRequest},
    question::NewQuestion,
    response::{NewResponse, SurveyResponse},
    survey::{NewSurvey, SurveyDetail},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Constraint names shared by both stores so callers can tell conflicts apart.
pub mod constraints {
    pub const SINGLE_ACTIVE_SURVEY: &str = "idx_surveys_single_active";
    pub const ACCESS_KEY_TOKEN: &str = "access_keys_key_unique";
    pub const ACCESS_KEY_SURVEY_EMAIL: &str = "access_keys_survey_email_unique";
    pub const COLLABORATOR_EMAIL: &str = "collaborators_email_unique";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("store unavailable: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Storage abstraction over surveys, questions, access keys, responses and collaborators.
///
/// Mutations that must be atomic say so; implementations honor that with a single
/// statement or a transaction.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Inserts a survey and its questions as one unit. Nothing is kept if any row fails.
    async fn create_survey(
        &self,
        survey: NewSurvey,
        questions: Vec<NewQuestion>,
    ) -> Result<SurveyDetail, StoreError>;

    /// All surveys with questions and keys, active first.
    async fn list_surveys(&self) -> Result<Vec<SurveyDetail>, StoreError>;

    async fn find_survey(
        &self,
        id: Uuid,
        with_responses: bool,
    ) -> Result<Option<SurveyDetail>, StoreError>;

    async fn find_active_survey(&self) -> Result<Option<SurveyDetail>, StoreError>;

    /// Deactivates every other survey and activates `id` atomically.
    /// Returns the number of rows activated (0 when `id` does not exist, in which case nothing changes).
    async fn activate_survey(&self, id: Uuid) -> Result<u64, StoreError>;

    async fn deactivate_survey(&self, id: Uuid) -> Result<u64, StoreError>;

    async fn deactivate_all_surveys(&self) -> Result<u64, StoreError>;

    /// Deletes a survey together with its questions, keys and responses.
    async fn delete_survey(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Inserts a batch of keys in one statement. Either all rows land or none do.
    async fn insert_access_keys(&self, keys: Vec<NewAccessKey>) -> Result<Vec<AccessKey>, StoreError>;

    async fn list_access_keys(&self, survey_id: Uuid) -> Result<Vec<AccessKey>, StoreError>;

    async fn find_access_key(&self, id: Uuid) -> Result<Option<AccessKey>, StoreError>;

    async fn find_access_key_by_token(&self, token: &str) -> Result<Option<AccessKey>, StoreError>;

    /// `SET is_used = true WHERE id = $1 AND is_used = false`. Returns the affected row count.
    async fn redeem_access_key(&self, id: Uuid) -> Result<u64, StoreError>;

    /// `SET is_sent = true WHERE id = $1`. Returns the affected row count.
    async fn mark_access_key_sent(&self, id: Uuid) -> Result<u64, StoreError>;

    async fn delete_access_key(&self, id: Uuid) -> Result<u64, StoreError>;

    async fn insert_response(&self, response: NewResponse) -> Result<SurveyResponse, StoreError>;

    /// Responses of one survey, newest first.
    async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>, StoreError>;

    /// Collaborators ordered by last name.
    async fn list_collaborators(&self) -> Result<Vec<Collaborator>, StoreError>;

    async fn insert_collaborator(&self, collaborator: CollaboratorRequest) -> Result<Collaborator, StoreError>;

    async fn update_collaborator(
        &self,
        id: Uuid,
        collaborator: CollaboratorRequest,
    ) -> Result<u64, StoreError>;

    async fn delete_collaborator(&self, id: Uuid) -> Result<u64, StoreError>;
}
