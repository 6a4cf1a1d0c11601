// src/engine/submission.rs

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    engine::{AccessKeyService, EngineError, ResponseWizard, SurveyService, store_failure},
    models::{
        question::Question,
        response::{FormattedAnswer, NewResponse, ResponseAnswers, SubmissionReceipt},
    },
    store::SurveyStore,
};

/// Final validation, persistence and key redemption for a wizard session.
#[derive(Clone)]
pub struct SubmissionPipeline {
    store: Arc<dyn SurveyStore>,
    keys: AccessKeyService,
    surveys: SurveyService,
}

impl SubmissionPipeline {
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self {
            keys: AccessKeyService::new(store.clone()),
            surveys: SurveyService::new(store.clone()),
            store,
        }
    }

    /// Opens a session for the survey an access key token belongs to.
    pub async fn open_session(&self, token: &str) -> Result<ResponseWizard, EngineError> {
        let key = self.keys.resolve(token).await?;
        let survey = self.surveys.find(key.survey_id, false).await?;
        Ok(ResponseWizard::start(survey, key.id))
    }

    /// Submits the session.
    ///
    /// Local validation failures leave the session untouched so the respondent
    /// can fix it; success and permanent failures reset it. The response is
    /// stored before the key is redeemed, so a redemption conflict can leave a
    /// response without a redeemed key. The key itself is never used twice.
    pub async fn submit(&self, wizard: &mut ResponseWizard) -> Result<SubmissionReceipt, EngineError> {
        let (survey_id, access_key_id) = match (wizard.survey_id(), wizard.access_key_id()) {
            (Some(survey_id), Some(access_key_id)) => (survey_id, access_key_id),
            _ => return Err(EngineError::MissingIdentity),
        };

        validate_session(wizard)?;

        let result = self.persist_and_redeem(wizard, survey_id, access_key_id).await;

        match &result {
            Ok(receipt) => tracing::info!(
                "Response {} stored for survey {}",
                receipt.response_id,
                survey_id
            ),
            Err(e) => tracing::warn!("Submission for survey {} failed: {}", survey_id, e),
        }

        if result.is_ok() || result.as_ref().is_err_and(EngineError::is_permanent) {
            wizard.reset();
        }
        result
    }

    async fn persist_and_redeem(
        &self,
        wizard: &mut ResponseWizard,
        survey_id: Uuid,
        access_key_id: Uuid,
    ) -> Result<SubmissionReceipt, EngineError> {
        let total_points = wizard.total_points();
        let response = self
            .store
            .insert_response(NewResponse {
                survey_id,
                answers: format_answers(wizard.questions(), wizard.weights(), wizard.ratings()),
                submitted_at: Utc::now(),
            })
            .await
            .map_err(store_failure("store response"))?;

        if let Err(e) = self.keys.redeem(access_key_id).await {
            tracing::warn!(
                "Response {} stored but access key {} could not be redeemed",
                response.id,
                access_key_id
            );
            return Err(e);
        }

        wizard.mark_submitted();
        Ok(SubmissionReceipt {
            response_id: response.id,
            survey_id,
            total_points,
            submitted_at: response.submitted_at,
            is_submitted: wizard.is_submitted(),
        })
    }
}

/// Every weight and rating present, and the point total inside the budget.
pub fn validate_session(wizard: &ResponseWizard) -> Result<(), EngineError> {
    let missing_weights = wizard.missing_weights();
    let missing_ratings = wizard.missing_ratings();
    if missing_weights > 0 || missing_ratings > 0 {
        return Err(EngineError::IncompleteAnswers {
            missing_weights,
            missing_ratings,
        });
    }

    if !wizard.is_valid_points() {
        return Err(EngineError::PointBudget {
            total: wizard.total_points(),
        });
    }
    Ok(())
}

/// Joins each value with the label of its question.
///
/// A value whose question has no label for that axis is left out of that
/// axis' map.
pub fn format_answers(
    questions: &[Question],
    weights: &BTreeMap<Uuid, f64>,
    ratings: &BTreeMap<Uuid, f64>,
) -> ResponseAnswers {
    ResponseAnswers {
        ratings: labelled(questions, ratings, |q| q.rating.as_ref()),
        weights: labelled(questions, weights, |q| q.weighting.as_ref()),
    }
}

fn labelled(
    questions: &[Question],
    values: &BTreeMap<Uuid, f64>,
    label: impl Fn(&Question) -> Option<&String>,
) -> BTreeMap<Uuid, FormattedAnswer> {
    values
        .iter()
        .filter_map(|(id, value)| {
            let question = questions.iter().find(|q| q.id == *id)?;
            let text = label(question)?;
            Some((
                *id,
                FormattedAnswer {
                    value: *value,
                    text: text.clone(),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(rating: Option<&str>, weighting: Option<&str>) -> Question {
        Question {
            id: Uuid::new_v4(),
            survey_id: Uuid::nil(),
            position: 0,
            rating: rating.map(str::to_string),
            weighting: weighting.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn test_format_answers_joins_labels() {
        let q1 = question(Some("Quality"), Some("Importance"));
        let weights = BTreeMap::from([(q1.id, 20.0)]);
        let ratings = BTreeMap::from([(q1.id, 4.0)]);

        let answers = format_answers(&[q1.clone()], &weights, &ratings);

        assert_eq!(
            answers.weights[&q1.id],
            FormattedAnswer {
                value: 20.0,
                text: "Importance".to_string()
            }
        );
        assert_eq!(answers.ratings[&q1.id].text, "Quality");
    }

    #[test]
    fn test_format_answers_omits_unlabelled_axis() {
        let weight_only = question(None, Some("Importance"));
        let rating_only = question(Some("Quality"), None);
        let weights = BTreeMap::from([(weight_only.id, 10.0), (rating_only.id, 10.0)]);
        let ratings = BTreeMap::from([(weight_only.id, 3.0), (rating_only.id, 3.0)]);

        let answers = format_answers(&[weight_only.clone(), rating_only.clone()], &weights, &ratings);

        assert_eq!(answers.weights.len(), 1);
        assert!(answers.weights.contains_key(&weight_only.id));
        assert_eq!(answers.ratings.len(), 1);
        assert!(answers.ratings.contains_key(&rating_only.id));
    }

    #[test]
    fn test_empty_session_is_out_of_budget() {
        let wizard = ResponseWizard::new();
        // No questions: nothing missing, but an empty allocation is out of budget.
        assert!(matches!(
            validate_session(&wizard),
            Err(EngineError::PointBudget { total }) if total == 0.0
        ));
    }
}
