//! Organization handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use atelier_types::Org;
use atelier_types::dto::{CreateOrgRequest, DeleteResponse, OrgResponse, UpdateOrgRequest};

use crate::validation::{validate_optional_name, validate_required_name};
use crate::{ApiError, AppState};

/// List all organizations
#[tracing::instrument(skip(state))]
pub async fn list_orgs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let orgs = state.repo.list_orgs().await?;
    Ok(Json(orgs.into_iter().map(OrgResponse::from).collect::<Vec<_>>()))
}

/// Create a new organization
///
/// When no name is provided a random identifier is assigned.
#[tracing::instrument(skip(state))]
pub async fn create_org(
    State(state): State<AppState>,
    Json(request): Json<CreateOrgRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_optional_name(request.name.as_deref())?;

    let org = Org::new(request.name.unwrap_or_default());
    let created = state.repo.create_org(org).await?;

    tracing::info!(org_id = created.id, org_name = %created.name, "Organization created");

    Ok((StatusCode::CREATED, Json(OrgResponse::from(created))))
}

/// Fetch one organization
#[tracing::instrument(skip(state))]
pub async fn get_org(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let org = state.repo.get_org(org_id).await?;
    Ok(Json(OrgResponse::from(org)))
}

/// Rename an organization
#[tracing::instrument(skip(state))]
pub async fn update_org(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
    Json(request): Json<UpdateOrgRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_required_name(&request.name)?;

    let mut org = state.repo.get_org(org_id).await?;
    org.name = request.name;
    let updated = state.repo.update_org(org).await?;

    Ok(Json(OrgResponse::from(updated)))
}

/// Delete an organization.
///
/// Refused while the organization still owns projects; clients must remove
/// those first.
#[tracing::instrument(skip(state))]
pub async fn delete_org(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = state.repo.list_projects(Some(org_id)).await?;
    if !projects.is_empty() {
        return Err(ApiError::Forbidden(format!(
            "organization {org_id} still owns {} project(s)",
            projects.len()
        )));
    }
    state.repo.remove_org(org_id).await?;

    tracing::info!(org_id, "Organization deleted");

    Ok(Json(DeleteResponse { status: true }))
}
