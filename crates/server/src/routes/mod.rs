pub mod cases;
pub mod health;
pub mod metrics;
pub mod scores;
pub mod sessions;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

/// Build the simulator API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cases", get(cases::search).post(cases::create))
        .route("/cases/$generate", post(cases::generate))
        .route("/cases/{id}", get(cases::read))
        .route("/assets/$analyze", post(cases::analyze_asset))
        .route("/sessions", post(sessions::create))
        .route(
            "/sessions/{id}",
            get(sessions::read).delete(sessions::delete),
        )
        .route("/sessions/{id}/messages", post(sessions::send_message))
        .route("/sessions/{id}/orders", post(sessions::order_test))
        .route("/sessions/{id}/interpret", post(sessions::interpret))
        .route("/sessions/{id}/tutor", post(sessions::ask_tutor))
        .route("/sessions/{id}/reflection", post(sessions::reflection))
        .route("/sessions/{id}/autopilot", post(sessions::autopilot))
        .route("/sessions/{id}/handover", post(sessions::handover))
        .route("/sessions/{id}/resume", post(sessions::resume))
        .route("/sessions/{id}/evaluate", post(sessions::evaluate))
        .route("/scores", get(scores::get))
}
