//! Health check endpoint

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    store: &'static str,
    model_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// GET /health - Check score store connectivity and return server health status
pub async fn check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.backend();
    let model_configured = state.simulator.is_some();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                store,
                model_configured,
                reason: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, store, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    store,
                    model_configured,
                    reason: Some(e.to_string()),
                }),
            )
        }
    }
}
