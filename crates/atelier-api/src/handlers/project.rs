//! Project handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use atelier_types::Project;
use atelier_types::dto::{
    CreateProjectRequest, DeleteResponse, ProjectResponse, UpdateProjectRequest,
};

use crate::validation::{validate_optional_name, validate_required_name};
use crate::{ApiError, AppState};

/// List projects across all organizations
#[tracing::instrument(skip(state))]
pub async fn list_all_projects(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = state.repo.list_projects(None).await?;
    Ok(Json(projects.into_iter().map(ProjectResponse::from).collect::<Vec<_>>()))
}

/// List projects under one organization
#[tracing::instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = state.repo.list_projects(Some(org_id)).await?;
    Ok(Json(projects.into_iter().map(ProjectResponse::from).collect::<Vec<_>>()))
}

/// Create a project under an organization
#[tracing::instrument(skip(state))]
pub async fn create_project(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_optional_name(request.name.as_deref())?;

    let project = Project::new(org_id, request.name.unwrap_or_default());
    let created = state.repo.create_project(project).await?;

    tracing::info!(org_id, project_id = created.id, project_name = %created.name, "Project created");

    Ok((StatusCode::CREATED, Json(ProjectResponse::from(created))))
}

/// Fetch one project
#[tracing::instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    Path((org_id, project_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.repo.get_project(org_id, project_id).await?;
    Ok(Json(ProjectResponse::from(project)))
}

/// Rename a project
#[tracing::instrument(skip(state))]
pub async fn update_project(
    State(state): State<AppState>,
    Path((org_id, project_id)): Path<(i64, i64)>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_required_name(&request.name)?;

    let mut project = state.repo.get_project(org_id, project_id).await?;
    project.name = request.name;
    let updated = state.repo.update_project(project).await?;

    Ok(Json(ProjectResponse::from(updated)))
}

/// Delete a project and its attached source
#[tracing::instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    Path((org_id, project_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.remove_project(org_id, project_id).await?;

    tracing::info!(org_id, project_id, "Project deleted");

    Ok(Json(DeleteResponse { status: true }))
}
