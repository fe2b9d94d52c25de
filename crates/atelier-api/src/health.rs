//! Health check endpoints for Kubernetes probes
//!
//! Provides liveness and readiness probes for container orchestration.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
    /// Service is unhealthy
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Storage engine health
    pub storage: HealthStatus,
}

/// Health tracker for the service
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Arc<AtomicU64>,
    ready: Arc<AtomicBool>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            start_time: Arc::new(AtomicU64::new(now)),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now.saturating_sub(self.start_time.load(Ordering::Relaxed))
    }

    /// Mark service as ready
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// Full health check, probes the storage engine
pub async fn health_check_handler(State(state): State<AppState>) -> impl IntoResponse {
    let storage_healthy = state.repo.is_healthy().await;
    let status = if storage_healthy { HealthStatus::Healthy } else { HealthStatus::Unhealthy };
    let code = if storage_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let response = HealthResponse {
        status,
        service: "atelier".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.health_tracker.uptime_seconds(),
        storage: if storage_healthy { HealthStatus::Healthy } else { HealthStatus::Unhealthy },
    };

    (code, Json(response))
}

/// Liveness probe, succeeds as long as the process can serve requests
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe, fails until startup finished and while storage is down
pub async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.health_tracker.is_ready() && state.repo.is_healthy().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
