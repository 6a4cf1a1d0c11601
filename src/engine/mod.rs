// src/engine/mod.rs

//! Survey response engine: point budget, access keys, survey lifecycle,
//! the respondent wizard and the submission pipeline.

pub mod access_keys;
pub mod collaborators;
pub mod points;
pub mod submission;
pub mod surveys;
pub mod wizard;

use crate::store::StoreError;

pub use access_keys::AccessKeyService;
pub use collaborators::CollaboratorService;
pub use submission::SubmissionPipeline;
pub use surveys::SurveyService;
pub use wizard::{ResponseWizard, WizardStep};

/// Errors surfaced by the engine to its immediate caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("survey id or access key id is missing")]
    MissingIdentity,

    #[error("{0}")]
    Validation(String),

    #[error("point total {total:.3} is outside the allowed budget")]
    PointBudget { total: f64 },

    #[error("answers are incomplete: {missing_weights} weight(s) and {missing_ratings} rating(s) missing")]
    IncompleteAnswers {
        missing_weights: usize,
        missing_ratings: usize,
    },

    /// Also the outcome of a submission whose key was redeemed concurrently.
    #[error("this invitation has already been used")]
    AlreadyUsed,

    #[error("this address has already been invited to the survey")]
    AlreadyInvited,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl EngineError {
    /// Failures after which a wizard session cannot be resubmitted as is.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyUsed | EngineError::NotFound(_) | EngineError::Persistence(_)
        )
    }
}

/// Logs a store failure with context and narrows it to an [`EngineError`].
pub(crate) fn store_failure(context: &'static str) -> impl FnOnce(StoreError) -> EngineError {
    move |err| {
        tracing::error!("Failed to {}: {:?}", context, err);
        EngineError::Persistence(err)
    }
}
