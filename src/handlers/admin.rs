// src/handlers/admin.rs

//! Survey administration: lifecycle, access keys and responses.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{AccessKeyService, SurveyService},
    error::AppError,
    mail::Mailer,
    models::{
        access_key::{IssueKeysRequest, KeyListQuery},
        survey::{CreateSurveyRequest, SurveyDetailQuery, SurveyListQuery},
    },
};

/// Lists survey summaries, active first.
pub async fn list_surveys(
    State(surveys): State<SurveyService>,
    Query(params): Query<SurveyListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let summaries = surveys.list(params.search.as_deref()).await?;
    Ok(Json(summaries))
}

/// Creates a survey with its questions.
pub async fn create_survey(
    State(surveys): State<SurveyService>,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let detail = surveys.create(payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_survey(
    State(surveys): State<SurveyService>,
    Path(id): Path<Uuid>,
    Query(params): Query<SurveyDetailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let detail = surveys.find(id, params.responses).await?;
    Ok(Json(detail))
}

/// Deletes a survey together with its questions, keys and responses.
pub async fn delete_survey(
    State(surveys): State<SurveyService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    surveys.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate_survey(
    State(surveys): State<SurveyService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    surveys.activate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn deactivate_survey(
    State(surveys): State<SurveyService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    surveys.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn deactivate_all_surveys(
    State(surveys): State<SurveyService>,
) -> Result<impl IntoResponse, AppError> {
    let deactivated = surveys.deactivate_all().await?;
    Ok(Json(serde_json::json!({ "deactivated": deactivated })))
}

/// Responses of one survey, newest first.
pub async fn list_responses(
    State(surveys): State<SurveyService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let responses = surveys.responses(id).await?;
    Ok(Json(responses))
}

/// Keys of a survey, filtered, with statistics over all of them.
pub async fn list_keys(
    State(keys): State<AccessKeyService>,
    Path(survey_id): Path<Uuid>,
    Query(params): Query<KeyListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let listing = keys.list(survey_id, &params).await?;
    Ok(Json(listing))
}

/// Issues one key per e-mail and sends the invitations.
pub async fn issue_keys(
    State(keys): State<AccessKeyService>,
    State(mailer): State<Arc<dyn Mailer>>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<IssueKeysRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let issued = keys
        .issue_and_invite(survey_id, &payload.emails, mailer.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Creates one key with no invitee.
pub async fn generate_key(
    State(keys): State<AccessKeyService>,
    Path(survey_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let key = keys.generate_key(survey_id).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn send_invitation(
    State(keys): State<AccessKeyService>,
    State(mailer): State<Arc<dyn Mailer>>,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let issued = keys.resend_invitation(key_id, mailer.as_ref()).await?;
    Ok(Json(issued))
}

pub async fn delete_key(
    State(keys): State<AccessKeyService>,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !keys.revoke(key_id).await? {
        return Err(AppError::NotFound("Access key not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
