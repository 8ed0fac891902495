//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local use.

use std::env;
use std::path::PathBuf;

use crate::identity::HostedUi;

/// Default record API paths, relative to `record_api_base_url`.
pub const DEFAULT_START_PATH: &str = "setRecordStart";
pub const DEFAULT_END_PATH: &str = "setRecordEnd";
pub const DEFAULT_RECORDS_PATH: &str = "getRecord";
pub const DEFAULT_AGGREGATE_PATH: &str = "getRecordAll";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Record API ---
    /// Base URL of the record API (no trailing slash needed)
    pub record_api_base_url: String,
    pub start_path: String,
    pub end_path: String,
    pub records_path: String,
    pub aggregate_path: String,
    /// Advisory arm endpoint; the arm call is skipped when unset
    pub arm_path: Option<String>,
    /// Per-request timeout
    pub http_timeout_secs: u64,

    // --- Check-in ---
    /// Physical stops a rider may select
    pub stops: Vec<String>,
    /// Durable client state file
    pub state_path: PathBuf,
    /// How long a started trip may be ended
    pub trip_window_minutes: u64,
    /// Quiet period after each processed scan
    pub scan_cooldown_ms: u64,

    // --- Identity provider (hosted UI) ---
    pub cognito_domain: Option<String>,
    pub cognito_client_id: Option<String>,
    pub cognito_redirect_uri: Option<String>,
    pub cognito_logout_uri: Option<String>,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let stops = parse_stops(
            &env::var("CHECKIN_STOPS").map_err(|_| ConfigError::Missing("CHECKIN_STOPS"))?,
        )?;

        Ok(Self {
            record_api_base_url: env::var("RECORD_API_BASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("RECORD_API_BASE_URL"))?,
            start_path: env::var("RECORD_API_START_PATH")
                .unwrap_or_else(|_| DEFAULT_START_PATH.to_string()),
            end_path: env::var("RECORD_API_END_PATH")
                .unwrap_or_else(|_| DEFAULT_END_PATH.to_string()),
            records_path: env::var("RECORD_API_RECORDS_PATH")
                .unwrap_or_else(|_| DEFAULT_RECORDS_PATH.to_string()),
            aggregate_path: env::var("RECORD_API_AGGREGATE_PATH")
                .unwrap_or_else(|_| DEFAULT_AGGREGATE_PATH.to_string()),
            arm_path: non_empty_var("RECORD_API_ARM_PATH"),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", 10)?,

            stops,
            state_path: env::var("CHECKIN_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("stop_checkin_state.json")),
            trip_window_minutes: parse_var("TRIP_WINDOW_MINUTES", 90)?,
            scan_cooldown_ms: parse_var("SCAN_COOLDOWN_MS", 1500)?,

            cognito_domain: non_empty_var("COGNITO_DOMAIN"),
            cognito_client_id: non_empty_var("COGNITO_APP_CLIENT_ID"),
            cognito_redirect_uri: non_empty_var("COGNITO_REDIRECT_URI"),
            cognito_logout_uri: non_empty_var("COGNITO_LOGOUT_URI"),

            log_json: env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Config for testing only.
    pub fn test_default() -> Self {
        Self {
            record_api_base_url: "http://127.0.0.1:9".to_string(),
            start_path: DEFAULT_START_PATH.to_string(),
            end_path: DEFAULT_END_PATH.to_string(),
            records_path: DEFAULT_RECORDS_PATH.to_string(),
            aggregate_path: DEFAULT_AGGREGATE_PATH.to_string(),
            arm_path: None,
            http_timeout_secs: 5,
            stops: vec![
                "Main St".to_string(),
                "Library".to_string(),
                "Harbor".to_string(),
            ],
            state_path: PathBuf::from("test_state.json"),
            trip_window_minutes: 90,
            scan_cooldown_ms: 1500,
            cognito_domain: None,
            cognito_client_id: None,
            cognito_redirect_uri: None,
            cognito_logout_uri: None,
            log_json: false,
        }
    }

    /// Hosted UI settings, if the identity provider is configured.
    pub fn hosted_ui(&self) -> Option<HostedUi> {
        Some(HostedUi {
            domain: self.cognito_domain.clone()?,
            client_id: self.cognito_client_id.clone()?,
            redirect_uri: self.cognito_redirect_uri.clone()?,
            logout_uri: self.cognito_logout_uri.clone(),
        })
    }
}

/// Split a comma-separated stop list, dropping blanks and duplicates.
fn parse_stops(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut stops: Vec<String> = Vec::new();
    for stop in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !stops.iter().any(|s| s == stop) {
            stops.push(stop.to_string());
        }
    }

    if stops.is_empty() {
        return Err(ConfigError::Invalid {
            name: "CHECKIN_STOPS",
            reason: "at least one stop is required".to_string(),
        });
    }
    Ok(stops)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{}", e),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
