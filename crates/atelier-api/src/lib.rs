//! # Atelier API - REST API Layer
//!
//! Exposes the organization/project hierarchy, sources and pipeline
//! templates over HTTP, backed by any storage engine implementing the
//! repository trait.

use std::sync::Arc;

use atelier_config::Config;
use atelier_repository::{Repository, RepositoryError};
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod handlers;
pub mod health;
pub mod validation;

use handlers::{org, project, source, template};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ApiError::NotFound(what),
            RepositoryError::AlreadyExists(what) => ApiError::Conflict(what),
            RepositoryError::Conflict(what) => ApiError::Conflict(what),
            RepositoryError::Validation(what) => ApiError::InvalidRequest(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub config: Arc<Config>,
    pub health_tracker: Arc<health::HealthTracker>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, config: Arc<Config>) -> Self {
        Self { repo, config, health_tracker: Arc::new(health::HealthTracker::new()) }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check_handler))
        .route("/health/live", get(health::liveness_handler))
        .route("/health/ready", get(health::readiness_handler))
        .route("/v1/org", get(org::list_orgs).post(org::create_org))
        .route(
            "/v1/org/{org_id}",
            get(org::get_org).patch(org::update_org).delete(org::delete_org),
        )
        .route(
            "/v1/org/{org_id}/proj",
            get(project::list_projects).post(project::create_project),
        )
        .route(
            "/v1/org/{org_id}/proj/{proj_id}",
            get(project::get_project)
                .patch(project::update_project)
                .delete(project::delete_project),
        )
        .route(
            "/v1/org/{org_id}/proj/{proj_id}/source",
            axum::routing::post(source::create_source),
        )
        .route("/v1/proj", get(project::list_all_projects))
        .route(
            "/v1/source/{source_id}",
            get(source::get_source).delete(source::delete_source),
        )
        .route("/v1/pipeline/template", get(template::list_templates))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
///
/// Waits for SIGTERM (Kubernetes) or SIGINT (Ctrl+C) and initiates graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    info!("Shutdown signal received, draining connections...");
}

/// Start the REST API server
pub async fn serve(repo: Arc<dyn Repository>, config: Arc<Config>) -> anyhow::Result<()> {
    let state = AppState::new(repo, Arc::clone(&config));
    state.health_tracker.set_ready(true);

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting REST API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use atelier_repository::MemoryRepository;
    use atelier_types::dto::{DeleteResponse, OrgResponse, ProjectResponse, SourceResponse};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let state = AppState::new(repo, Arc::new(Config::default()));
        state.health_tracker.set_ready(true);
        state
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state());
        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_probe() {
        let app = create_router(create_test_state());
        let response = app.oneshot(empty_request("GET", "/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_org_lifecycle() {
        let app = create_router(create_test_state());

        // Create
        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "acme"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let org: OrgResponse = body_json(response).await;
        assert_eq!(org.name, "acme");
        assert_eq!(org.id, 1);

        // Get
        let response = app.clone().oneshot(empty_request("GET", "/v1/org/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Rename
        let response = app
            .clone()
            .oneshot(json_request("PATCH", "/v1/org/1", json!({"name": "acme-corp"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let org: OrgResponse = body_json(response).await;
        assert_eq!(org.name, "acme-corp");

        // List
        let response = app.clone().oneshot(empty_request("GET", "/v1/org")).await.unwrap();
        let orgs: Vec<OrgResponse> = body_json(response).await;
        assert_eq!(orgs.len(), 1);

        // Delete
        let response = app.clone().oneshot(empty_request("DELETE", "/v1/org/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: DeleteResponse = body_json(response).await;
        assert!(result.status);

        let response = app.oneshot(empty_request("GET", "/v1/org/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_org_without_name_gets_random_one() {
        let app = create_router(create_test_state());
        let response =
            app.oneshot(json_request("POST", "/v1/org", json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let org: OrgResponse = body_json(response).await;
        assert!(!org.name.is_empty());
    }

    #[tokio::test]
    async fn test_update_org_rejects_empty_name() {
        let app = create_router(create_test_state());
        app.clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "acme"})))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request("PATCH", "/v1/org/1", json!({"name": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_org_refused_while_projects_exist() {
        let app = create_router(create_test_state());
        app.clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "acme"})))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request("POST", "/v1/org/1/proj", json!({"name": "web"})))
            .await
            .unwrap();

        let response = app.clone().oneshot(empty_request("DELETE", "/v1/org/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // After removing the project the delete goes through
        app.clone()
            .oneshot(empty_request("DELETE", "/v1/org/1/proj/1"))
            .await
            .unwrap();
        let response = app.oneshot(empty_request("DELETE", "/v1/org/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_project_lifecycle() {
        let app = create_router(create_test_state());
        app.clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "acme"})))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/org/1/proj", json!({"name": "web"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let project: ProjectResponse = body_json(response).await;
        assert_eq!(project.org_id, 1);
        assert_eq!(project.name, "web");

        let response =
            app.clone().oneshot(empty_request("GET", "/v1/org/1/proj/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request("PATCH", "/v1/org/1/proj/1", json!({"name": "web-v2"})))
            .await
            .unwrap();
        let project: ProjectResponse = body_json(response).await;
        assert_eq!(project.name, "web-v2");

        let response = app.clone().oneshot(empty_request("GET", "/v1/org/1/proj")).await.unwrap();
        let projects: Vec<ProjectResponse> = body_json(response).await;
        assert_eq!(projects.len(), 1);

        let response = app.clone().oneshot(empty_request("GET", "/v1/proj")).await.unwrap();
        let projects: Vec<ProjectResponse> = body_json(response).await;
        assert_eq!(projects.len(), 1);

        let response =
            app.clone().oneshot(empty_request("DELETE", "/v1/org/1/proj/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(empty_request("GET", "/v1/org/1/proj/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_project_under_missing_org() {
        let app = create_router(create_test_state());
        let response = app
            .oneshot(json_request("POST", "/v1/org/42/proj", json!({"name": "web"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_source_lifecycle_and_conflict() {
        let app = create_router(create_test_state());
        app.clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "acme"})))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request("POST", "/v1/org/1/proj", json!({"name": "web"})))
            .await
            .unwrap();

        let attach = json!({"kind": "github", "repository": "acme/web"});
        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/org/1/proj/1/source", attach.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let source: SourceResponse = body_json(response).await;
        assert_eq!(source.repository, "acme/web");
        assert_eq!(source.project_id, 1);

        // Second attach is a conflict
        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/org/1/proj/1/source", attach))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // Source shows up embedded in the project
        let response = app.clone().oneshot(empty_request("GET", "/v1/org/1/proj/1")).await.unwrap();
        let project: ProjectResponse = body_json(response).await;
        assert!(project.source.is_some());

        let response = app.clone().oneshot(empty_request("GET", "/v1/source/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response =
            app.clone().oneshot(empty_request("DELETE", "/v1/source/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(empty_request("GET", "/v1/source/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_source_validation() {
        let app = create_router(create_test_state());
        app.clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "acme"})))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request("POST", "/v1/org/1/proj", json!({"name": "web"})))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/org/1/proj/1/source",
                json!({"kind": "", "repository": "acme/web"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_source_attach_through_wrong_org() {
        let app = create_router(create_test_state());
        app.clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "acme"})))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request("POST", "/v1/org", json!({"name": "other"})))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request("POST", "/v1/org/1/proj", json!({"name": "web"})))
            .await
            .unwrap();

        // Project 1 belongs to org 1, not org 2
        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/org/2/proj/1/source",
                json!({"kind": "github", "repository": "acme/web"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_template_catalog_empty() {
        let app = create_router(create_test_state());
        let response = app.oneshot(empty_request("GET", "/v1/pipeline/template")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let templates: Vec<Value> = body_json(response).await;
        assert!(templates.is_empty());
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let app = create_router(create_test_state());
        let response = app.oneshot(empty_request("GET", "/v1/org/7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = body_json(response).await;
        assert!(body.get("error").is_some());
    }
}
