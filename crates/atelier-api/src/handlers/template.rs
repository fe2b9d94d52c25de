//! Pipeline template handlers

use axum::{Json, extract::State, response::IntoResponse};
use atelier_types::dto::TemplateResponse;

use crate::{ApiError, AppState};

/// List the pipeline template catalog.
///
/// Engines without template storage return an empty list.
#[tracing::instrument(skip(state))]
pub async fn list_templates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let templates = state.repo.list_pipeline_templates().await?;
    Ok(Json(templates.into_iter().map(TemplateResponse::from).collect::<Vec<_>>()))
}
