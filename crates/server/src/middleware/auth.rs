//! API key authentication

use axum::{
    Json,
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use clinsim_core::Outcome;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// API Key authentication state
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: Option<String>,
}

impl ApiKeyAuth {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    /// Requests pass when no key is configured or the header matches
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|provided| provided == expected),
        }
    }
}

/// Reject requests without a valid `X-API-Key`
pub async fn auth_middleware(request: Request<Body>, next: Next) -> Response {
    let auth = request.extensions().get::<ApiKeyAuth>().cloned();

    if let Some(auth) = auth {
        if !auth.is_authorized(request.headers()) {
            tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
            let outcome = Outcome::unauthorized("Missing or invalid API key");
            return (StatusCode::UNAUTHORIZED, Json(outcome)).into_response();
        }
    }

    next.run(request).await
}
