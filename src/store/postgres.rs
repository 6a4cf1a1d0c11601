// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    models::{
        access_key::{AccessKey, NewAccessKey},
        collaborator::{Collaborator, CollaboratorRequest},
        question::{NewQuestion, Question},
        response::{NewResponse, SurveyResponse},
        survey::{NewSurvey, Survey, SurveyDetail},
    },
    store::{StoreError, SurveyStore},
};

const SURVEY_COLUMNS: &str = "id, title, description, point_multiplier, is_active, created_at";
const QUESTION_COLUMNS: &str = "id, survey_id, position, rating, weighting, created_at";
const KEY_COLUMNS: &str = "id, key, survey_id, email, is_used, is_sent, created_at";
const RESPONSE_COLUMNS: &str = "id, survey_id, answers, submitted_at";
const COLLABORATOR_COLUMNS: &str = "id, first_name, last_name, email, created_at";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads questions and keys for the given surveys and nests them.
    async fn attach_children(&self, surveys: Vec<Survey>) -> Result<Vec<SurveyDetail>, StoreError> {
        if surveys.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = surveys.iter().map(|s| s.id).collect();

        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE survey_id = ANY($1) ORDER BY position, created_at"
        ))
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let keys = sqlx::query_as::<_, AccessKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM access_keys WHERE survey_id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut questions_by_survey: HashMap<Uuid, Vec<Question>> = HashMap::new();
        for q in questions {
            questions_by_survey.entry(q.survey_id).or_default().push(q);
        }
        let mut keys_by_survey: HashMap<Uuid, Vec<AccessKey>> = HashMap::new();
        for k in keys {
            keys_by_survey.entry(k.survey_id).or_default().push(k);
        }

        Ok(surveys
            .into_iter()
            .map(|survey| SurveyDetail {
                questions: questions_by_survey.remove(&survey.id).unwrap_or_default(),
                access_keys: keys_by_survey.remove(&survey.id).unwrap_or_default(),
                responses: None,
                survey,
            })
            .collect())
    }
}

#[async_trait]
impl SurveyStore for PgStore {
    async fn create_survey(
        &self,
        survey: NewSurvey,
        questions: Vec<NewQuestion>,
    ) -> Result<SurveyDetail, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Survey>(&format!(
            r#"
            INSERT INTO surveys (title, description, point_multiplier)
            VALUES ($1, $2, $3)
            RETURNING {SURVEY_COLUMNS}
            "#
        ))
        .bind(&survey.title)
        .bind(&survey.description)
        .bind(survey.point_multiplier)
        .fetch_one(&mut *tx)
        .await?;

        let created_questions = if questions.is_empty() {
            Vec::new()
        } else {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO questions (survey_id, position, rating, weighting) ");
            builder.push_values(&questions, |mut b, q| {
                b.push_bind(row.id)
                    .push_bind(q.position)
                    .push_bind(q.rating.clone())
                    .push_bind(q.weighting.clone());
            });
            builder.push(format!(" RETURNING {QUESTION_COLUMNS}"));

            let mut rows: Vec<Question> = builder.build_query_as().fetch_all(&mut *tx).await?;
            rows.sort_by_key(|q| q.position);
            rows
        };

        tx.commit().await?;

        Ok(SurveyDetail {
            survey: row,
            questions: created_questions,
            access_keys: Vec::new(),
            responses: None,
        })
    }

    async fn list_surveys(&self) -> Result<Vec<SurveyDetail>, StoreError> {
        let surveys = sqlx::query_as::<_, Survey>(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys ORDER BY is_active DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.attach_children(surveys).await
    }

    async fn find_survey(
        &self,
        id: Uuid,
        with_responses: bool,
    ) -> Result<Option<SurveyDetail>, StoreError> {
        let survey = sqlx::query_as::<_, Survey>(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(survey) = survey else {
            return Ok(None);
        };

        let mut detail = self.attach_children(vec![survey]).await?.pop();
        if with_responses {
            if let Some(detail) = detail.as_mut() {
                detail.responses = Some(self.list_responses(id).await?);
            }
        }
        Ok(detail)
    }

    async fn find_active_survey(&self) -> Result<Option<SurveyDetail>, StoreError> {
        let survey = sqlx::query_as::<_, Survey>(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys WHERE is_active = TRUE LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        match survey {
            Some(survey) => Ok(self.attach_children(vec![survey]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn activate_survey(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Deactivate first so the single-active index never sees two rows.
        sqlx::query("UPDATE surveys SET is_active = FALSE WHERE is_active = TRUE AND id <> $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let activated = sqlx::query("UPDATE surveys SET is_active = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if activated == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        tx.commit().await?;
        Ok(activated)
    }

    async fn deactivate_survey(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE surveys SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn deactivate_all_surveys(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE surveys SET is_active = FALSE WHERE is_active = TRUE")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_survey(&self, id: Uuid) -> Result<u64, StoreError> {
        // Questions, keys and responses go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM surveys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_access_keys(&self, keys: Vec<NewAccessKey>) -> Result<Vec<AccessKey>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO access_keys (key, survey_id, email, is_used, is_sent) ");
        builder.push_values(&keys, |mut b, k| {
            b.push_bind(k.key.clone())
                .push_bind(k.survey_id)
                .push_bind(k.email.clone())
                .push_bind(false)
                .push_bind(false);
        });
        builder.push(format!(" RETURNING {KEY_COLUMNS}"));

        let rows: Vec<AccessKey> = builder.build_query_as().fetch_all(&self.pool).await?;

        // RETURNING order is not part of the contract; restore the input order by token.
        let mut by_token: HashMap<String, AccessKey> =
            rows.into_iter().map(|k| (k.key.clone(), k)).collect();
        Ok(keys
            .iter()
            .filter_map(|k| by_token.remove(&k.key))
            .collect())
    }

    async fn list_access_keys(&self, survey_id: Uuid) -> Result<Vec<AccessKey>, StoreError> {
        let keys = sqlx::query_as::<_, AccessKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM access_keys WHERE survey_id = $1 ORDER BY created_at, id"
        ))
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn find_access_key(&self, id: Uuid) -> Result<Option<AccessKey>, StoreError> {
        let key = sqlx::query_as::<_, AccessKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM access_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn find_access_key_by_token(&self, token: &str) -> Result<Option<AccessKey>, StoreError> {
        let key = sqlx::query_as::<_, AccessKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM access_keys WHERE key = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn redeem_access_key(&self, id: Uuid) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE access_keys SET is_used = TRUE WHERE id = $1 AND is_used = FALSE")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn mark_access_key_sent(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE access_keys SET is_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_access_key(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM access_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_response(&self, response: NewResponse) -> Result<SurveyResponse, StoreError> {
        let row = sqlx::query_as::<_, SurveyResponse>(&format!(
            r#"
            INSERT INTO responses (survey_id, answers, submitted_at)
            VALUES ($1, $2, $3)
            RETURNING {RESPONSE_COLUMNS}
            "#
        ))
        .bind(response.survey_id)
        .bind(sqlx::types::Json(&response.answers))
        .bind(response.submitted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>, StoreError> {
        let rows = sqlx::query_as::<_, SurveyResponse>(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM responses WHERE survey_id = $1 ORDER BY submitted_at DESC"
        ))
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_collaborators(&self) -> Result<Vec<Collaborator>, StoreError> {
        let rows = sqlx::query_as::<_, Collaborator>(&format!(
            "SELECT {COLLABORATOR_COLUMNS} FROM collaborators ORDER BY last_name ASC, first_name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_collaborator(&self, collaborator: CollaboratorRequest) -> Result<Collaborator, StoreError> {
        let row = sqlx::query_as::<_, Collaborator>(&format!(
            r#"
            INSERT INTO collaborators (first_name, last_name, email)
            VALUES ($1, $2, $3)
            RETURNING {COLLABORATOR_COLUMNS}
            "#
        ))
        .bind(&collaborator.first_name)
        .bind(&collaborator.last_name)
        .bind(&collaborator.email)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_collaborator(
        &self,
        id: Uuid,
        collaborator: CollaboratorRequest,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE collaborators SET first_name = $1, last_name = $2, email = $3 WHERE id = $4",
        )
        .bind(&collaborator.first_name)
        .bind(&collaborator.last_name)
        .bind(&collaborator.email)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_collaborator(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM collaborators WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
