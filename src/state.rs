// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    engine::{AccessKeyService, CollaboratorService, SubmissionPipeline, SurveyService},
    mail::Mailer,
    store::SurveyStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SurveyStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn SurveyStore>, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Mailer> {
    fn from_ref(state: &AppState) -> Self {
        state.mailer.clone()
    }
}

impl FromRef<AppState> for SurveyService {
    fn from_ref(state: &AppState) -> Self {
        SurveyService::new(state.store.clone())
    }
}

impl FromRef<AppState> for AccessKeyService {
    fn from_ref(state: &AppState) -> Self {
        AccessKeyService::new(state.store.clone())
    }
}

impl FromRef<AppState> for SubmissionPipeline {
    fn from_ref(state: &AppState) -> Self {
        SubmissionPipeline::new(state.store.clone())
    }
}

impl FromRef<AppState> for CollaboratorService {
    fn from_ref(state: &AppState) -> Self {
        CollaboratorService::new(state.store.clone())
    }
}
