//! clinsim-server: clinical training simulator binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinsim_server::AppState;
use clinsim_server::config::Config;
use clinsim_server::scores::{
    FileScoreStore, MemoryScoreStore, PgScoreStore, ScoreStore, create_pool,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env();

    // Pick the score store
    let store: Arc<dyn ScoreStore> = if let Some(url) = &config.database_url {
        let pool = create_pool(url).expect("Failed to create database pool");
        let store = PgScoreStore::new(pool);
        store
            .migrate()
            .await
            .expect("Failed to prepare score table");
        Arc::new(store)
    } else if let Some(path) = &config.scores_path {
        Arc::new(FileScoreStore::new(path))
    } else {
        tracing::warn!("No DATABASE_URL or SCORES_PATH set, scores are kept in memory");
        Arc::new(MemoryScoreStore::new())
    };

    let book = store.load().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load scores, starting empty");
        Default::default()
    });
    tracing::info!(
        store = store.backend(),
        cases_completed = book.cases_completed(),
        total_score = book.total_score(),
        "Score book loaded"
    );

    // Log startup info
    if config.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("API key authentication disabled (no API_KEY env var)");
    }
    if config.gemini_api_key.is_some() {
        tracing::info!(model = %config.gemini_model, "Gemini API key configured, simulation enabled");
    } else {
        tracing::warn!("GEMINI_API_KEY not set, simulation routes disabled");
    }
    tracing::info!("Rate limiting: {} requests/second", config.rate_limit_rps);

    let state = AppState::new(store, book, config.autopilot_max_turns)
        .with_session_idle_ttl(Duration::from_secs(config.session_idle_ttl_secs))
        .with_gemini(&config);
    let _sweeper = state.sessions.spawn_sweeper(Duration::from_secs(60));
    tracing::info!(
        idle_ttl_secs = config.session_idle_ttl_secs,
        "Idle session eviction enabled"
    );
    let app = clinsim_server::build_app(state, &config);

    // Start server
    let addr: SocketAddr = config.bind_address.parse().expect("Invalid bind address");
    tracing::info!("Starting clinical simulator on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
