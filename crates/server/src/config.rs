//! Server configuration

use crate::ai::client::{DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use crate::session::driver::DEFAULT_MAX_TURNS;
use crate::session::registry::DEFAULT_IDLE_TTL;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// Shared secret expected in `X-API-Key`; auth is off when unset
    pub api_key: Option<String>,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_base_url: String,
    /// Scores go to PostgreSQL when set
    pub database_url: Option<String>,
    /// Otherwise to this JSON file; in memory when neither is set
    pub scores_path: Option<String>,
    pub autopilot_max_turns: u32,
    /// Seconds a session may go unseen before it is dropped
    pub session_idle_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            api_key: None,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 100,
            gemini_api_key: None,
            gemini_model: DEFAULT_TEXT_MODEL.to_string(),
            gemini_image_model: DEFAULT_IMAGE_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            database_url: None,
            scores_path: None,
            autopilot_max_turns: DEFAULT_MAX_TURNS,
            session_idle_ttl_secs: DEFAULT_IDLE_TTL.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_address: non_empty("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            api_key: non_empty("API_KEY"),
            cors_origins: non_empty("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: non_empty("RATE_LIMIT_RPS")
                .and_then(|v| v.parse().ok())
                .filter(|&rps| rps > 0)
                .unwrap_or(defaults.rate_limit_rps),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_image_model: non_empty("GEMINI_IMAGE_MODEL")
                .unwrap_or(defaults.gemini_image_model),
            gemini_base_url: non_empty("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            database_url: non_empty("DATABASE_URL"),
            scores_path: non_empty("SCORES_PATH"),
            autopilot_max_turns: non_empty("AUTOPILOT_MAX_TURNS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.autopilot_max_turns),
            session_idle_ttl_secs: non_empty("SESSION_IDLE_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|&secs| secs > 0)
                .unwrap_or(defaults.session_idle_ttl_secs),
        }
    }
}
