// src/handlers/survey.rs

//! Respondent-facing endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    engine::{EngineError, SubmissionPipeline, SurveyService},
    error::AppError,
    models::{response::SubmitResponseRequest, survey::PublicSurvey},
};

/// Returns the survey currently open to respondents.
pub async fn get_active_survey(
    State(surveys): State<SurveyService>,
) -> Result<impl IntoResponse, AppError> {
    let detail = surveys.active().await?;
    Ok(Json(PublicSurvey::from(detail)))
}

/// Resolves an invitation token to the survey it opens.
pub async fn get_survey_by_key(
    State(pipeline): State<SubmissionPipeline>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let wizard = pipeline.open_session(&key).await?;
    Ok(Json(serde_json::json!({
        "survey_id": wizard.survey_id(),
        "title": wizard.survey_title(),
        "point_multiplier": wizard.point_multiplier(),
        "questions": wizard.questions(),
        "current_step": wizard.current_step(),
    })))
}

/// Walks a fresh session through every step with the posted answers, then submits it.
pub async fn submit_response(
    State(pipeline): State<SubmissionPipeline>,
    Path(key): Path<String>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut wizard = pipeline.open_session(&key).await?;

    wizard.next_step();
    for (question_id, weight) in &payload.weights {
        wizard
            .set_weight(*question_id, *weight)
            .map_err(answer_rejected)?;
    }

    wizard.next_step();
    for (question_id, rating) in &payload.ratings {
        wizard
            .set_rating(*question_id, *rating)
            .map_err(answer_rejected)?;
    }

    wizard.next_step();

    let receipt = pipeline.submit(&mut wizard).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// An answer naming a question outside the survey is a malformed request here.
fn answer_rejected(err: EngineError) -> AppError {
    AppError::BadRequest(err.to_string())
}
