//! Liveness endpoints.
//!
//! - `GET /` returns `OK` for load-balancer probes
//! - `GET /health` returns `{"status":"healthy"}`
//!
//! Neither touches a downstream service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
        }
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `GET /health`
pub async fn health_handler() -> HealthResponse {
    HealthResponse::healthy()
}

/// `GET /`
pub async fn root_handler() -> &'static str {
    "OK"
}
