// src/store/memory.rs

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    models::{
        access_key::{AccessKey, NewAccessKey},
        collaborator::{Collaborator, CollaboratorRequest},
        question::{NewQuestion, Question},
        response::{NewResponse, SurveyResponse},
        survey::{NewSurvey, Survey, SurveyDetail},
    },
    store::{StoreError, SurveyStore, constraints},
};

/// In-process store with the same guarantees as [`super::PgStore`].
///
/// Every operation runs under one mutex, so conditional updates and batch
/// inserts are atomic with respect to each other.
pub struct MemoryStore {
    inner: Mutex<Tables>,
    unique_invitee_email: bool,
}

#[derive(Default)]
struct Tables {
    surveys: Vec<Survey>,
    questions: Vec<Question>,
    access_keys: Vec<AccessKey>,
    responses: Vec<SurveyResponse>,
    collaborators: Vec<Collaborator>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Enforces one key per (survey, e-mail), like the Postgres schema.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
            unique_invitee_email: true,
        }
    }

    /// Only key tokens are unique; the same address may be invited repeatedly.
    pub fn without_email_uniqueness() -> Self {
        Self {
            unique_invitee_email: false,
            ..Self::new()
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store poisoned: {e}")))
    }
}

impl Tables {
    fn detail(&self, survey: &Survey) -> SurveyDetail {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| q.survey_id == survey.id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.position);

        SurveyDetail {
            survey: survey.clone(),
            questions,
            access_keys: self.keys_of(survey.id),
            responses: None,
        }
    }

    fn keys_of(&self, survey_id: Uuid) -> Vec<AccessKey> {
        self.access_keys
            .iter()
            .filter(|k| k.survey_id == survey_id)
            .cloned()
            .collect()
    }

    fn responses_of(&self, survey_id: Uuid) -> Vec<SurveyResponse> {
        let mut rows: Vec<SurveyResponse> = self
            .responses
            .iter()
            .filter(|r| r.survey_id == survey_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        rows
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.collaborators
            .iter()
            .any(|c| c.email == email && Some(c.id) != except)
    }
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn create_survey(
        &self,
        survey: NewSurvey,
        questions: Vec<NewQuestion>,
    ) -> Result<SurveyDetail, StoreError> {
        let mut tables = self.tables()?;
        let row = Survey {
            id: Uuid::new_v4(),
            title: survey.title,
            description: survey.description,
            point_multiplier: survey.point_multiplier,
            is_active: false,
            created_at: Some(Utc::now()),
        };
        let created = questions
            .into_iter()
            .map(|q| Question {
                id: Uuid::new_v4(),
                survey_id: row.id,
                position: q.position,
                rating: q.rating,
                weighting: q.weighting,
                created_at: Some(Utc::now()),
            })
            .collect::<Vec<Question>>();

        tables.surveys.push(row.clone());
        tables.questions.extend(created);
        Ok(tables.detail(&row))
    }

    async fn list_surveys(&self) -> Result<Vec<SurveyDetail>, StoreError> {
        let tables = self.tables()?;
        // Newest first within each activity group.
        let mut surveys: Vec<&Survey> = tables.surveys.iter().rev().collect();
        surveys.sort_by_key(|s| !s.is_active);
        Ok(surveys.into_iter().map(|s| tables.detail(s)).collect())
    }

    async fn find_survey(
        &self,
        id: Uuid,
        with_responses: bool,
    ) -> Result<Option<SurveyDetail>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.surveys.iter().find(|s| s.id == id).map(|s| {
            let mut detail = tables.detail(s);
            if with_responses {
                detail.responses = Some(tables.responses_of(id));
            }
            detail
        }))
    }

    async fn find_active_survey(&self) -> Result<Option<SurveyDetail>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .surveys
            .iter()
            .find(|s| s.is_active)
            .map(|s| tables.detail(s)))
    }

    async fn activate_survey(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        if !tables.surveys.iter().any(|s| s.id == id) {
            return Ok(0);
        }
        for survey in tables.surveys.iter_mut() {
            survey.is_active = survey.id == id;
        }
        Ok(1)
    }

    async fn deactivate_survey(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let mut affected = 0;
        for survey in tables.surveys.iter_mut().filter(|s| s.id == id) {
            survey.is_active = false;
            affected += 1;
        }
        Ok(affected)
    }

    async fn deactivate_all_surveys(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let mut affected = 0;
        for survey in tables.surveys.iter_mut().filter(|s| s.is_active) {
            survey.is_active = false;
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_survey(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.surveys.len();
        tables.surveys.retain(|s| s.id != id);
        let affected = (before - tables.surveys.len()) as u64;
        if affected > 0 {
            tables.questions.retain(|q| q.survey_id != id);
            tables.access_keys.retain(|k| k.survey_id != id);
            tables.responses.retain(|r| r.survey_id != id);
        }
        Ok(affected)
    }

    async fn insert_access_keys(&self, keys: Vec<NewAccessKey>) -> Result<Vec<AccessKey>, StoreError> {
        let mut tables = self.tables()?;

        // Check the whole batch before touching anything.
        for (i, new) in keys.iter().enumerate() {
            let earlier = &keys[..i];
            if tables.access_keys.iter().any(|k| k.key == new.key)
                || earlier.iter().any(|k| k.key == new.key)
            {
                return Err(unique_violation(constraints::ACCESS_KEY_TOKEN));
            }
            if self.unique_invitee_email {
                if let Some(email) = new.email.as_deref() {
                    let same_invitee = |survey_id: Uuid, other: Option<&str>| {
                        survey_id == new.survey_id && other == Some(email)
                    };
                    if tables
                        .access_keys
                        .iter()
                        .any(|k| same_invitee(k.survey_id, k.email.as_deref()))
                        || earlier
                            .iter()
                            .any(|k| same_invitee(k.survey_id, k.email.as_deref()))
                    {
                        return Err(unique_violation(constraints::ACCESS_KEY_SURVEY_EMAIL));
                    }
                }
            }
        }

        let created: Vec<AccessKey> = keys
            .into_iter()
            .map(|k| AccessKey {
                id: Uuid::new_v4(),
                key: k.key,
                survey_id: k.survey_id,
                email: k.email,
                is_used: false,
                is_sent: false,
                created_at: Some(Utc::now()),
            })
            .collect();
        tables.access_keys.extend(created.iter().cloned());
        Ok(created)
    }

    async fn list_access_keys(&self, survey_id: Uuid) -> Result<Vec<AccessKey>, StoreError> {
        Ok(self.tables()?.keys_of(survey_id))
    }

    async fn find_access_key(&self, id: Uuid) -> Result<Option<AccessKey>, StoreError> {
        Ok(self.tables()?.access_keys.iter().find(|k| k.id == id).cloned())
    }

    async fn find_access_key_by_token(&self, token: &str) -> Result<Option<AccessKey>, StoreError> {
        Ok(self
            .tables()?
            .access_keys
            .iter()
            .find(|k| k.key == token)
            .cloned())
    }

    async fn redeem_access_key(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        match tables
            .access_keys
            .iter_mut()
            .find(|k| k.id == id && !k.is_used)
        {
            Some(key) => {
                key.is_used = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_access_key_sent(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        match tables.access_keys.iter_mut().find(|k| k.id == id) {
            Some(key) => {
                key.is_sent = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_access_key(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.access_keys.len();
        tables.access_keys.retain(|k| k.id != id);
        Ok((before - tables.access_keys.len()) as u64)
    }

    async fn insert_response(&self, response: NewResponse) -> Result<SurveyResponse, StoreError> {
        let mut tables = self.tables()?;
        if !tables.surveys.iter().any(|s| s.id == response.survey_id) {
            return Err(StoreError::Backend(format!(
                "foreign key violated: survey {} does not exist",
                response.survey_id
            )));
        }
        let row = SurveyResponse {
            id: Uuid::new_v4(),
            survey_id: response.survey_id,
            answers: Json(response.answers),
            submitted_at: response.submitted_at,
        };
        tables.responses.push(row.clone());
        Ok(row)
    }

    async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>, StoreError> {
        Ok(self.tables()?.responses_of(survey_id))
    }

    async fn list_collaborators(&self) -> Result<Vec<Collaborator>, StoreError> {
        let mut rows = self.tables()?.collaborators.clone();
        rows.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(rows)
    }

    async fn insert_collaborator(&self, collaborator: CollaboratorRequest) -> Result<Collaborator, StoreError> {
        let mut tables = self.tables()?;
        if tables.email_taken(&collaborator.email, None) {
            return Err(unique_violation(constraints::COLLABORATOR_EMAIL));
        }
        let row = Collaborator {
            id: Uuid::new_v4(),
            first_name: collaborator.first_name,
            last_name: collaborator.last_name,
            email: collaborator.email,
            created_at: Some(Utc::now()),
        };
        tables.collaborators.push(row.clone());
        Ok(row)
    }

    async fn update_collaborator(
        &self,
        id: Uuid,
        collaborator: CollaboratorRequest,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        if !tables.collaborators.iter().any(|c| c.id == id) {
            return Ok(0);
        }
        if tables.email_taken(&collaborator.email, Some(id)) {
            return Err(unique_violation(constraints::COLLABORATOR_EMAIL));
        }
        if let Some(row) = tables.collaborators.iter_mut().find(|c| c.id == id) {
            row.first_name = collaborator.first_name;
            row.last_name = collaborator.last_name;
            row.email = collaborator.email;
        }
        Ok(1)
    }

    async fn delete_collaborator(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.collaborators.len();
        tables.collaborators.retain(|c| c.id != id);
        Ok((before - tables.collaborators.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_key(survey_id: Uuid, token: &str, email: Option<&str>) -> NewAccessKey {
        NewAccessKey {
            key: token.to_string(),
            survey_id,
            email: email.map(str::to_string),
        }
    }

    async fn seeded_survey(store: &MemoryStore, title: &str) -> Uuid {
        store
            .create_survey(
                NewSurvey {
                    title: title.to_string(),
                    description: String::new(),
                    point_multiplier: 2.0,
                },
                vec![NewQuestion {
                    position: 0,
                    rating: Some("Quality".to_string()),
                    weighting: Some("Importance".to_string()),
                }],
            )
            .await
            .unwrap()
            .survey
            .id
    }

    #[tokio::test]
    async fn test_batch_with_duplicate_token_inserts_nothing() {
        let store = MemoryStore::new();
        let survey_id = seeded_survey(&store, "Batch").await;

        let err = store
            .insert_access_keys(vec![
                new_key(survey_id, "t-1", Some("a@x.com")),
                new_key(survey_id, "t-1", Some("b@x.com")),
            ])
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_of(constraints::ACCESS_KEY_TOKEN));
        assert!(store.list_access_keys(survey_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redeem_is_conditional() {
        let store = MemoryStore::new();
        let survey_id = seeded_survey(&store, "Redeem").await;
        let key = store
            .insert_access_keys(vec![new_key(survey_id, "t-2", None)])
            .await
            .unwrap()
            .remove(0);

        assert_eq!(store.redeem_access_key(key.id).await.unwrap(), 1);
        assert_eq!(store.redeem_access_key(key.id).await.unwrap(), 0);
        assert!(store.find_access_key(key.id).await.unwrap().unwrap().is_used);
    }

    #[tokio::test]
    async fn test_delete_survey_cascades() {
        let store = MemoryStore::new();
        let survey_id = seeded_survey(&store, "Cascade").await;
        store
            .insert_access_keys(vec![new_key(survey_id, "t-3", Some("c@x.com"))])
            .await
            .unwrap();

        assert_eq!(store.delete_survey(survey_id).await.unwrap(), 1);
        assert!(store.list_access_keys(survey_id).await.unwrap().is_empty());
        assert!(store.find_survey(survey_id, true).await.unwrap().is_none());
        assert_eq!(store.delete_survey(survey_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_orders_active_first() {
        let store = MemoryStore::new();
        let first = seeded_survey(&store, "First").await;
        let second = seeded_survey(&store, "Second").await;
        store.activate_survey(first).await.unwrap();

        let ids: Vec<Uuid> = store
            .list_surveys()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.survey.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }
}
