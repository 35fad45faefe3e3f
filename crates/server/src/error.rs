//! Application error handling

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clinsim_core::{IssueType, Outcome, SimError};

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// No model configured
    Unavailable(String),
    /// Lifecycle errors keep their own issue code
    Sim(SimError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, outcome) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Outcome::invalid(&msg)),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Outcome::error(IssueType::Transient, &msg),
            ),
            AppError::Sim(err) => {
                let status = match &err {
                    SimError::CaseNotFound(_) | SimError::SessionNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    SimError::Busy(_) => StatusCode::CONFLICT,
                    SimError::InvalidTransition { .. } | SimError::Inactive => {
                        StatusCode::CONFLICT
                    }
                    SimError::HandoverTooShort { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    SimError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    SimError::Model(_) => StatusCode::BAD_GATEWAY,
                    SimError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                }
                (status, err.to_outcome())
            }
        };

        (status, Json(outcome)).into_response()
    }
}

impl From<SimError> for AppError {
    fn from(err: SimError) -> Self {
        AppError::Sim(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_status_codes() {
        let cases = [
            (SimError::Busy("Patient typing...".into()), StatusCode::CONFLICT),
            (SimError::SessionNotFound("x".into()), StatusCode::NOT_FOUND),
            (SimError::HandoverTooShort { min: 5 }, StatusCode::UNPROCESSABLE_ENTITY),
            (SimError::Model("down".into()), StatusCode::BAD_GATEWAY),
            (SimError::Inactive, StatusCode::CONFLICT),
            (SimError::InvalidInput("blank".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
