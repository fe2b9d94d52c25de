//! Source handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use atelier_types::Source;
use atelier_types::dto::{CreateSourceRequest, DeleteResponse, SourceResponse};

use crate::validation::validate_source_fields;
use crate::{ApiError, AppState};

/// Attach a source repository to a project.
///
/// A project holds at most one source; a second attach attempt is rejected
/// with a conflict.
#[tracing::instrument(skip(state))]
pub async fn create_source(
    State(state): State<AppState>,
    Path((org_id, project_id)): Path<(i64, i64)>,
    Json(request): Json<CreateSourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_source_fields(&request.kind, &request.repository)?;

    // Resolve through the composite key so a project ID under the wrong org 404s
    let project = state.repo.get_project(org_id, project_id).await?;

    let source = Source::new(project.id, request.kind, request.repository);
    let created = state.repo.create_source(source).await?;

    tracing::info!(org_id, project_id, source_id = created.id, "Source attached");

    Ok((StatusCode::CREATED, Json(SourceResponse::from(created))))
}

/// Fetch one source by ID
#[tracing::instrument(skip(state))]
pub async fn get_source(
    State(state): State<AppState>,
    Path(source_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let source = state.repo.get_source(source_id).await?;
    Ok(Json(SourceResponse::from(source)))
}

/// Detach and delete a source by ID
#[tracing::instrument(skip(state))]
pub async fn delete_source(
    State(state): State<AppState>,
    Path(source_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.remove_source(source_id).await?;

    tracing::info!(source_id, "Source detached");

    Ok(Json(DeleteResponse { status: true }))
}
