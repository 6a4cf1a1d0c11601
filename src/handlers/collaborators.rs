// src/handlers/collaborators.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    engine::CollaboratorService,
    error::AppError,
    models::collaborator::{CollaboratorQuery, CollaboratorRequest},
};

pub async fn list_collaborators(
    State(collaborators): State<CollaboratorService>,
    Query(params): Query<CollaboratorQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = collaborators.list(params.search.as_deref()).await?;
    Ok(Json(rows))
}

pub async fn create_collaborator(
    State(collaborators): State<CollaboratorService>,
    Json(payload): Json<CollaboratorRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = collaborators.add(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_collaborator(
    State(collaborators): State<CollaboratorService>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CollaboratorRequest>,
) -> Result<impl IntoResponse, AppError> {
    collaborators.update(id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_collaborator(
    State(collaborators): State<CollaboratorService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    collaborators.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
