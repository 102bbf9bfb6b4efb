//! Application configuration loaded from environment variables.
//!
//! Game tuning lives in [`GameRules`]; every field has a production default
//! and can be overridden from the environment.

use chrono::Duration;
use std::env;
use std::str::FromStr;

/// Which `Store` implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "firestore" => Ok(StoreBackend::Firestore),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Thresholds and timings of the game itself.
#[derive(Debug, Clone)]
pub struct GameRules {
    /// Max distance between first and last point for a loop to count as closed
    pub closure_threshold_m: f64,
    /// Minimum number of points before a loop can be closed
    pub closure_min_points: usize,
    /// Minimum number of points for a trek to be accepted at all
    pub min_trek_points: usize,
    /// Uncaptured zones revert to neutral after this long
    pub expiry_window: Duration,
    /// Radius around a trekking player that counts as "near" a rival zone
    pub proximity_radius_m: f64,
    /// Per-(zone, player) quiet period between proximity alerts
    pub proximity_cooldown: Duration,
    pub proximity_interval_secs: u64,
    pub expiry_interval_secs: u64,
    pub max_circle_radius_m: f64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            closure_threshold_m: 50.0,
            closure_min_points: 8,
            min_trek_points: 5,
            expiry_window: Duration::days(7),
            proximity_radius_m: 200.0,
            proximity_cooldown: Duration::minutes(30),
            proximity_interval_secs: 60,
            expiry_interval_secs: 3600,
            max_circle_radius_m: 1000.0,
        }
    }
}

impl GameRules {
    /// Defaults overridden by any of the tuning environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            closure_threshold_m: parse_or("CLOSURE_THRESHOLD_M", defaults.closure_threshold_m)?,
            closure_min_points: parse_or("CLOSURE_MIN_POINTS", defaults.closure_min_points)?,
            min_trek_points: parse_or("MIN_TREK_POINTS", defaults.min_trek_points)?,
            expiry_window: Duration::hours(parse_or(
                "EXPIRY_WINDOW_HOURS",
                defaults.expiry_window.num_hours(),
            )?),
            proximity_radius_m: parse_or("PROXIMITY_RADIUS_M", defaults.proximity_radius_m)?,
            proximity_cooldown: Duration::minutes(parse_or(
                "PROXIMITY_COOLDOWN_MINUTES",
                defaults.proximity_cooldown.num_minutes(),
            )?),
            proximity_interval_secs: parse_or(
                "PROXIMITY_INTERVAL_SECS",
                defaults.proximity_interval_secs,
            )?,
            expiry_interval_secs: parse_or("EXPIRY_INTERVAL_SECS", defaults.expiry_interval_secs)?,
            max_circle_radius_m: parse_or("MAX_CIRCLE_RADIUS_M", defaults.max_circle_radius_m)?,
        })
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend (mini app) URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Spawn the sweep loops in-process instead of relying on an external scheduler
    pub run_sweeps: bool,
    /// Optional webhook receiving outbound notifications
    pub notify_webhook_url: Option<String>,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared token the scheduler presents on `/tasks/*`
    pub scheduler_token: String,
    /// HMAC key for signing webhook bodies
    pub notify_webhook_secret: Option<Vec<u8>>,

    pub rules: GameRules,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            run_sweeps: false,
            notify_webhook_url: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            scheduler_token: "test_scheduler_token".to_string(),
            notify_webhook_secret: None,
            rules: GameRules::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend: env::var("STORE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
            run_sweeps: parse_or("RUN_SWEEPS", true)?,
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            scheduler_token: env::var("SCHEDULER_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SCHEDULER_TOKEN"))?,
            notify_webhook_secret: env::var("NOTIFY_WEBHOOK_SECRET")
                .ok()
                .map(|v| v.trim().as_bytes().to_vec()),

            rules: GameRules::from_env()?,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
