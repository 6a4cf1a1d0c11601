// src/engine/access_keys.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    engine::{EngineError, store_failure},
    mail::{Invitation, Mailer},
    models::access_key::{
        AccessKey, IssuedKey, KeyListQuery, KeyListResponse, KeyStatistics, KeyStatusFilter,
        NewAccessKey,
    },
    store::{StoreError, SurveyStore, constraints},
};

/// Issuance, redemption and status of single-use access keys.
#[derive(Clone)]
pub struct AccessKeyService {
    store: Arc<dyn SurveyStore>,
}

/// Fresh unguessable token.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

impl AccessKeyService {
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self { store }
    }

    /// Creates one unused, unsent key per e-mail in a single atomic insert.
    ///
    /// Addresses are stored trimmed and lowercased, so case variants count as
    /// the same invitee. The returned keys are in the same order as `emails`.
    /// If the batch is rejected, no key from it exists.
    pub async fn issue_keys(
        &self,
        survey_id: Uuid,
        emails: &[String],
    ) -> Result<Vec<AccessKey>, EngineError> {
        self.require_survey(survey_id).await?;

        let batch: Vec<NewAccessKey> = emails
            .iter()
            .map(|email| NewAccessKey {
                key: generate_token(),
                survey_id,
                email: Some(email.trim().to_lowercase()),
            })
            .collect();

        self.store
            .insert_access_keys(batch)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { ref constraint }
                    if constraint == constraints::ACCESS_KEY_SURVEY_EMAIL =>
                {
                    tracing::warn!("Key batch for survey {} hit an existing invitee", survey_id);
                    EngineError::AlreadyInvited
                }
                other => store_failure("insert access keys")(other),
            })
    }

    /// Creates a single key with no invitee attached.
    pub async fn generate_key(&self, survey_id: Uuid) -> Result<AccessKey, EngineError> {
        self.require_survey(survey_id).await?;

        let mut created = self
            .store
            .insert_access_keys(vec![NewAccessKey {
                key: generate_token(),
                survey_id,
                email: None,
            }])
            .await
            .map_err(store_failure("insert access key"))?;

        created.pop().ok_or_else(|| {
            EngineError::Persistence(StoreError::Backend("insert returned no key".to_string()))
        })
    }

    /// Marks the key used. Exactly one caller can win per key; the rest get
    /// [`EngineError::AlreadyUsed`].
    pub async fn redeem(&self, key_id: Uuid) -> Result<(), EngineError> {
        let affected = self
            .store
            .redeem_access_key(key_id)
            .await
            .map_err(store_failure("redeem access key"))?;

        if affected == 1 {
            tracing::info!("Access key {} redeemed", key_id);
            return Ok(());
        }

        // Nothing changed: either the key is gone or someone got there first.
        match self
            .store
            .find_access_key(key_id)
            .await
            .map_err(store_failure("look up access key"))?
        {
            Some(_) => {
                tracing::warn!("Access key {} was already used", key_id);
                Err(EngineError::AlreadyUsed)
            }
            None => Err(EngineError::NotFound("access key".to_string())),
        }
    }

    /// Idempotent: marking an already sent key succeeds.
    pub async fn mark_sent(&self, key_id: Uuid) -> Result<(), EngineError> {
        let affected = self
            .store
            .mark_access_key_sent(key_id)
            .await
            .map_err(store_failure("mark access key sent"))?;

        if affected == 0 {
            return Err(EngineError::NotFound("access key".to_string()));
        }
        Ok(())
    }

    /// Deletes a key. Returns `false` when it did not exist.
    pub async fn revoke(&self, key_id: Uuid) -> Result<bool, EngineError> {
        let affected = self
            .store
            .delete_access_key(key_id)
            .await
            .map_err(store_failure("delete access key"))?;

        if affected == 0 {
            tracing::warn!("Access key {} to revoke does not exist", key_id);
            return Ok(false);
        }
        Ok(true)
    }

    /// Looks up a token a respondent presented. Used keys are refused here
    /// already; the binding check remains [`Self::redeem`].
    pub async fn resolve(&self, token: &str) -> Result<AccessKey, EngineError> {
        let key = self
            .store
            .find_access_key_by_token(token)
            .await
            .map_err(store_failure("resolve access key"))?
            .ok_or_else(|| EngineError::NotFound("access key".to_string()))?;

        if key.is_used {
            return Err(EngineError::AlreadyUsed);
        }
        Ok(key)
    }

    pub async fn list(
        &self,
        survey_id: Uuid,
        query: &KeyListQuery,
    ) -> Result<KeyListResponse, EngineError> {
        self.require_survey(survey_id).await?;

        let keys = self
            .store
            .list_access_keys(survey_id)
            .await
            .map_err(store_failure("list access keys"))?;

        let statistics = key_statistics(&keys);
        Ok(KeyListResponse {
            keys: filter_keys(keys, query.search.as_deref(), query.status),
            statistics,
        })
    }

    /// Issues keys for `emails` and sends one invitation per key.
    ///
    /// Mail failures do not fail the call: the key simply stays unsent.
    pub async fn issue_and_invite(
        &self,
        survey_id: Uuid,
        emails: &[String],
        mailer: &dyn Mailer,
    ) -> Result<Vec<IssuedKey>, EngineError> {
        let title = self.require_survey(survey_id).await?;
        let keys = self.issue_keys(survey_id, emails).await?;

        let mut issued = Vec::with_capacity(keys.len());
        for key in keys {
            issued.push(self.invite(key, &title, mailer).await);
        }
        Ok(issued)
    }

    /// Retries the invitation of one key.
    pub async fn resend_invitation(
        &self,
        key_id: Uuid,
        mailer: &dyn Mailer,
    ) -> Result<IssuedKey, EngineError> {
        let key = self
            .store
            .find_access_key(key_id)
            .await
            .map_err(store_failure("look up access key"))?
            .ok_or_else(|| EngineError::NotFound("access key".to_string()))?;

        if key.email.is_none() {
            return Err(EngineError::Validation(
                "this key has no invitee address".to_string(),
            ));
        }
        if key.is_used {
            return Err(EngineError::AlreadyUsed);
        }

        let title = self.require_survey(key.survey_id).await?;
        Ok(self.invite(key, &title, mailer).await)
    }

    async fn invite(&self, mut key: AccessKey, survey_title: &str, mailer: &dyn Mailer) -> IssuedKey {
        let Some(email) = key.email.clone() else {
            return IssuedKey {
                access_key: key,
                invitation_sent: false,
            };
        };

        let invitation = Invitation {
            recipient_email: email,
            survey_title: survey_title.to_string(),
            access_key: key.key.clone(),
        };

        let invitation_sent = match mailer.send_invitation(&invitation).await {
            Ok(()) => match self.mark_sent(key.id).await {
                Ok(()) => {
                    key.is_sent = true;
                    true
                }
                Err(e) => {
                    tracing::warn!("Invitation for key {} sent but not flagged: {}", key.id, e);
                    true
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to send invitation to {}: {}",
                    invitation.recipient_email,
                    e
                );
                false
            }
        };

        IssuedKey {
            access_key: key,
            invitation_sent,
        }
    }

    /// Returns the survey title, or `NotFound`.
    async fn require_survey(&self, survey_id: Uuid) -> Result<String, EngineError> {
        self.store
            .find_survey(survey_id, false)
            .await
            .map_err(store_failure("look up survey"))?
            .map(|detail| detail.survey.title)
            .ok_or_else(|| EngineError::NotFound("survey".to_string()))
    }
}

/// Case-insensitive token search plus status filter.
pub fn filter_keys(
    keys: Vec<AccessKey>,
    search: Option<&str>,
    status: KeyStatusFilter,
) -> Vec<AccessKey> {
    let needle = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    keys.into_iter()
        .filter(|k| match &needle {
            Some(needle) => k.key.to_lowercase().contains(needle),
            None => true,
        })
        .filter(|k| match status {
            KeyStatusFilter::All => true,
            KeyStatusFilter::Used => k.is_used,
            KeyStatusFilter::Available => !k.is_used,
            KeyStatusFilter::Sent => k.is_sent,
        })
        .collect()
}

pub fn key_statistics(keys: &[AccessKey]) -> KeyStatistics {
    KeyStatistics {
        total: keys.len(),
        used: keys.iter().filter(|k| k.is_used).count(),
        sent: keys.iter().filter(|k| k.is_sent).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(token: &str, is_used: bool, is_sent: bool) -> AccessKey {
        AccessKey {
            id: Uuid::new_v4(),
            key: token.to_string(),
            survey_id: Uuid::nil(),
            email: None,
            is_used,
            is_sent,
            created_at: None,
        }
    }

    fn sample() -> Vec<AccessKey> {
        vec![
            key("ABC-123", true, true),
            key("abd-456", false, true),
            key("xyz-789", false, false),
        ]
    }

    #[test]
    fn test_filter_by_search_ignores_case() {
        let tokens: Vec<String> = filter_keys(sample(), Some("ab"), KeyStatusFilter::All)
            .into_iter()
            .map(|k| k.key)
            .collect();
        assert_eq!(tokens, vec!["ABC-123", "abd-456"]);
    }

    #[test]
    fn test_filter_by_status() {
        assert_eq!(filter_keys(sample(), None, KeyStatusFilter::Used).len(), 1);
        assert_eq!(filter_keys(sample(), None, KeyStatusFilter::Available).len(), 2);
        assert_eq!(filter_keys(sample(), None, KeyStatusFilter::Sent).len(), 2);
        assert_eq!(filter_keys(sample(), Some("   "), KeyStatusFilter::All).len(), 3);
    }

    #[test]
    fn test_statistics() {
        assert_eq!(
            key_statistics(&sample()),
            KeyStatistics {
                total: 3,
                used: 1,
                sent: 2
            }
        );
    }

    #[test]
    fn test_tokens_are_distinct() {
        assert_ne!(generate_token(), generate_token());
    }
}
