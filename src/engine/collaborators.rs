// src/engine/collaborators.rs

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{EngineError, store_failure},
    models::collaborator::{Collaborator, CollaboratorRequest},
    store::{StoreError, SurveyStore, constraints},
};

/// Directory of people surveys are usually sent to.
#[derive(Clone)]
pub struct CollaboratorService {
    store: Arc<dyn SurveyStore>,
}

impl CollaboratorService {
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self { store }
    }

    /// Ordered by last name, optionally filtered on name or e-mail.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Collaborator>, EngineError> {
        let rows = self
            .store
            .list_collaborators()
            .await
            .map_err(store_failure("list collaborators"))?;

        Ok(match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(search) => rows.into_iter().filter(|c| c.matches(search)).collect(),
            None => rows,
        })
    }

    pub async fn add(&self, request: CollaboratorRequest) -> Result<Collaborator, EngineError> {
        let request = normalized(request)?;
        self.store
            .insert_collaborator(request)
            .await
            .map_err(|e| email_conflict(e, "add collaborator"))
    }

    pub async fn update(&self, id: Uuid, request: CollaboratorRequest) -> Result<(), EngineError> {
        let request = normalized(request)?;
        let affected = self
            .store
            .update_collaborator(id, request)
            .await
            .map_err(|e| email_conflict(e, "update collaborator"))?;

        if affected == 0 {
            return Err(EngineError::NotFound("collaborator".to_string()));
        }
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        let affected = self
            .store
            .delete_collaborator(id)
            .await
            .map_err(store_failure("delete collaborator"))?;

        if affected == 0 {
            return Err(EngineError::NotFound("collaborator".to_string()));
        }
        Ok(())
    }
}

/// Trimmed, e-mail lowercased, then validated.
fn normalized(request: CollaboratorRequest) -> Result<CollaboratorRequest, EngineError> {
    let request = CollaboratorRequest {
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        email: request.email.trim().to_lowercase(),
    };
    request
        .validate()
        .map_err(|e| EngineError::Validation(e.to_string()))?;
    Ok(request)
}

fn email_conflict(err: StoreError, context: &'static str) -> EngineError {
    if err.is_unique_violation_of(constraints::COLLABORATOR_EMAIL) {
        return EngineError::Conflict("this email is already in use".to_string());
    }
    store_failure(context)(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn request(first: &str, last: &str, email: &str) -> CollaboratorRequest {
        CollaboratorRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_case_insensitively() {
        let service = CollaboratorService::new(Arc::new(MemoryStore::new()));
        service.add(request("Ana", "Bel", "ana@x.com")).await.unwrap();

        let duplicate = service.add(request("Other", "Person", " ANA@x.com ")).await;
        assert!(matches!(duplicate, Err(EngineError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let service = CollaboratorService::new(Arc::new(MemoryStore::new()));
        let result = service.add(request("", "Bel", "not-an-email")).await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_are_not_found() {
        let service = CollaboratorService::new(Arc::new(MemoryStore::new()));
        let id = Uuid::new_v4();
        assert!(matches!(
            service.update(id, request("A", "B", "a@x.com")).await,
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(service.delete(id).await, Err(EngineError::NotFound(_))));
    }
}
