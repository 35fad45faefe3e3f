//! clinsim-server library crate
//!
//! Exposes `build_app`, `AppState` and `config` for integration tests.
//! The actual binary entrypoint is in `main.rs`.

pub mod ai;
pub mod config;
mod error;
mod middleware;
mod routes;
pub mod scores;
pub mod session;

use std::sync::Arc;

use axum::{Extension, Router, middleware as axum_mw, routing::get};
use clinsim_core::{CaseCatalog, ScoreBook};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ai::{GeminiClient, PatientSimulator};
use config::Config;
use error::AppError;
use middleware::ApiKeyAuth;
use scores::ScoreStore;
use session::SessionRegistry;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<CaseCatalog>>,
    pub sessions: SessionRegistry,
    /// `None` when no model is configured; model-backed routes return 503
    pub simulator: Option<PatientSimulator>,
    pub scores: Arc<Mutex<ScoreBook>>,
    pub store: Arc<dyn ScoreStore>,
    pub autopilot_max_turns: u32,
}

impl AppState {
    pub fn new(store: Arc<dyn ScoreStore>, book: ScoreBook, autopilot_max_turns: u32) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(CaseCatalog::builtin())),
            sessions: SessionRegistry::new(),
            simulator: None,
            scores: Arc::new(Mutex::new(book)),
            store,
            autopilot_max_turns,
        }
    }

    pub fn with_simulator(mut self, simulator: PatientSimulator) -> Self {
        self.simulator = Some(simulator);
        self
    }

    /// Drop sessions left unseen for `ttl`
    pub fn with_session_idle_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.sessions = SessionRegistry::with_idle_ttl(ttl);
        self
    }

    /// Wire the Gemini client from configuration, if a key is present
    pub fn with_gemini(self, config: &Config) -> Self {
        match &config.gemini_api_key {
            Some(key) => {
                let client =
                    GeminiClient::with_base_url(key.clone(), config.gemini_base_url.clone());
                self.with_simulator(PatientSimulator::new(Arc::new(client)).with_models(
                    config.gemini_model.clone(),
                    config.gemini_image_model.clone(),
                ))
            }
            None => self,
        }
    }

    fn simulator(&self) -> Result<&PatientSimulator, AppError> {
        self.simulator
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("GEMINI_API_KEY not configured".to_string()))
    }

    /// Keep the best score for the case and persist the book if it changed
    async fn record_score(&self, case_id: &str, score: u32) {
        let mut book = self.scores.lock().await;
        if !book.record(case_id, score) {
            return;
        }
        if let Err(e) = self.store.save(&book).await {
            tracing::error!(error = %e, store = self.store.backend(), "Failed to persist scores");
        }
    }
}

/// Build the full application router with all routes and middleware.
///
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a TCP port.
pub fn build_app(state: AppState, config: &Config) -> Router {
    let auth = ApiKeyAuth::new(config.api_key.clone());
    let rate_limiter = middleware::create_rate_limiter(config.rate_limit_rps);

    // Protected routes (require auth)
    let protected_routes = Router::new()
        .nest("/api", routes::api_routes())
        .layer(axum_mw::from_fn(middleware::auth_middleware))
        .layer(Extension(auth))
        .layer(axum_mw::from_fn(middleware::rate_limit_middleware))
        .layer(Extension(rate_limiter));

    // build_recorder() + set_global_recorder() so repeated calls (tests)
    // don't panic; the second install is ignored and the handle still renders
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let prometheus_handle = recorder.handle();
    let _ = metrics::set_global_recorder(recorder);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .layer(Extension(prometheus_handle));

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(axum_mw::from_fn(middleware::audit_middleware))
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_mw::from_fn(middleware::metrics_middleware))
}
