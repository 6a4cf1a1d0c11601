// src/engine/surveys.rs

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{EngineError, store_failure},
    models::{
        question::NewQuestion,
        response::SurveyResponse,
        survey::{CreateSurveyRequest, NewSurvey, SurveyDetail, SurveySummary, effective_multiplier},
    },
    store::{StoreError, SurveyStore, constraints},
    utils::html::clean_html,
};

/// Survey CRUD and the single-active-survey rule.
#[derive(Clone)]
pub struct SurveyService {
    store: Arc<dyn SurveyStore>,
}

impl SurveyService {
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self { store }
    }

    /// Creates the survey and its questions in one transaction.
    pub async fn create(&self, request: CreateSurveyRequest) -> Result<SurveyDetail, EngineError> {
        request
            .validate()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let survey = NewSurvey {
            title: clean_html(request.title.trim()),
            description: clean_html(request.description.trim()),
            point_multiplier: effective_multiplier(request.point_multiplier.unwrap_or_default()),
        };

        let questions: Vec<NewQuestion> = request
            .questions
            .iter()
            .enumerate()
            .map(|(position, q)| NewQuestion {
                position: position as i32,
                rating: label(q.rating.as_deref()),
                weighting: label(q.weighting.as_deref()),
            })
            .collect();

        let detail = self
            .store
            .create_survey(survey, questions)
            .await
            .map_err(store_failure("create survey"))?;

        tracing::info!(
            "Survey {} created with {} question(s)",
            detail.survey.id,
            detail.questions.len()
        );
        Ok(detail)
    }

    /// Makes `survey_id` the only active survey.
    pub async fn activate(&self, survey_id: Uuid) -> Result<(), EngineError> {
        let activated = self
            .store
            .activate_survey(survey_id)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { ref constraint }
                    if constraint == constraints::SINGLE_ACTIVE_SURVEY =>
                {
                    tracing::warn!("Concurrent activation while activating survey {}", survey_id);
                    EngineError::Conflict(
                        "another survey was activated at the same time, retry".to_string(),
                    )
                }
                other => store_failure("activate survey")(other),
            })?;

        if activated == 0 {
            return Err(EngineError::NotFound("survey".to_string()));
        }
        tracing::info!("Survey {} is now the active survey", survey_id);
        Ok(())
    }

    pub async fn deactivate(&self, survey_id: Uuid) -> Result<(), EngineError> {
        let affected = self
            .store
            .deactivate_survey(survey_id)
            .await
            .map_err(store_failure("deactivate survey"))?;

        if affected == 0 {
            return Err(EngineError::NotFound("survey".to_string()));
        }
        Ok(())
    }

    /// Returns how many surveys were switched off.
    pub async fn deactivate_all(&self) -> Result<u64, EngineError> {
        self.store
            .deactivate_all_surveys()
            .await
            .map_err(store_failure("deactivate all surveys"))
    }

    /// Deletes the survey with its questions, keys and responses.
    pub async fn delete(&self, survey_id: Uuid) -> Result<(), EngineError> {
        let affected = self
            .store
            .delete_survey(survey_id)
            .await
            .map_err(store_failure("delete survey"))?;

        if affected == 0 {
            return Err(EngineError::NotFound("survey".to_string()));
        }
        tracing::info!("Survey {} deleted", survey_id);
        Ok(())
    }

    /// Summaries, active survey first, optionally filtered by title or description.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<SurveySummary>, EngineError> {
        let surveys = self
            .store
            .list_surveys()
            .await
            .map_err(store_failure("list surveys"))?;

        Ok(filter_surveys(&surveys, search)
            .into_iter()
            .map(SurveySummary::from)
            .collect())
    }

    pub async fn find(&self, survey_id: Uuid, with_responses: bool) -> Result<SurveyDetail, EngineError> {
        self.store
            .find_survey(survey_id, with_responses)
            .await
            .map_err(store_failure("fetch survey"))?
            .ok_or_else(|| EngineError::NotFound("survey".to_string()))
    }

    pub async fn active(&self) -> Result<SurveyDetail, EngineError> {
        self.store
            .find_active_survey()
            .await
            .map_err(store_failure("fetch active survey"))?
            .ok_or_else(|| EngineError::NotFound("active survey".to_string()))
    }

    pub async fn responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>, EngineError> {
        self.find(survey_id, false).await?;
        self.store
            .list_responses(survey_id)
            .await
            .map_err(store_failure("list responses"))
    }
}

/// Empty labels are stored as absent.
fn label(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(clean_html)
}

/// Case-insensitive substring match on title or description.
pub fn filter_surveys<'a>(surveys: &'a [SurveyDetail], search: Option<&str>) -> Vec<&'a SurveyDetail> {
    let needle = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    surveys
        .iter()
        .filter(|detail| match &needle {
            Some(needle) => {
                detail.survey.title.to_lowercase().contains(needle)
                    || detail.survey.description.to_lowercase().contains(needle)
            }
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::survey::Survey;

    fn detail(title: &str, description: &str) -> SurveyDetail {
        SurveyDetail {
            survey: Survey {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: description.to_string(),
                point_multiplier: 1.0,
                is_active: false,
                created_at: None,
            },
            questions: Vec::new(),
            access_keys: Vec::new(),
            responses: None,
        }
    }

    #[test]
    fn test_filter_matches_title_or_description() {
        let surveys = vec![
            detail("Team Priorities", ""),
            detail("Budget", "Yearly PRIORITY review"),
            detail("Offsite", "Venue choice"),
        ];

        let hits: Vec<&str> = filter_surveys(&surveys, Some("priorit"))
            .into_iter()
            .map(|d| d.survey.title.as_str())
            .collect();
        assert_eq!(hits, vec!["Team Priorities", "Budget"]);
        assert_eq!(filter_surveys(&surveys, None).len(), 3);
        assert_eq!(filter_surveys(&surveys, Some("")).len(), 3);
    }

    #[test]
    fn test_blank_labels_become_absent() {
        assert_eq!(label(Some("   ")), None);
        assert_eq!(label(None), None);
        assert_eq!(label(Some(" Cost ")), Some("Cost".to_string()));
    }
}
