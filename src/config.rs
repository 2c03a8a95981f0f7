//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::SupabaseConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted backend connection
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Project URL; empty runs the in-memory backend
    #[serde(default)]
    pub url: String,

    /// Public (anon) API key
    #[serde(default)]
    pub anon_key: String,

    #[serde(default = "default_backend_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: default_backend_timeout(),
        }
    }
}

impl BackendConfig {
    /// Whether a hosted backend is configured
    pub fn is_remote(&self) -> bool {
        !self.url.trim().is_empty()
    }

    pub fn supabase(&self) -> SupabaseConfig {
        SupabaseConfig {
            url: self.url.clone(),
            anon_key: self.anon_key.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8085
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

/// Local session state
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Allow `remember_me` sign-ins to survive restarts
    #[serde(default = "default_persist_sessions")]
    pub persist_sessions: bool,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("goaltracker").to_string_lossy().to_string())
        .unwrap_or_else(|| "./goaltracker_data".to_string())
}

fn default_persist_sessions() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persist_sessions: default_persist_sessions(),
        }
    }
}

impl SessionConfig {
    /// Data directory with a leading `~` expanded
    pub fn data_path(&self) -> PathBuf {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.data_dir)),
            None => PathBuf::from(&self.data_dir),
        }
    }
}

/// User search
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_page_size() -> usize {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            page_size: default_page_size(),
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("goaltracker").join("config.toml")),
            Some(PathBuf::from("./goaltracker.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Backend overrides
        if let Some(url) = var("GOALTRACKER_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(key) = var("GOALTRACKER_ANON_KEY") {
            self.backend.anon_key = key;
        }

        // API overrides
        if let Some(host) = var("GOALTRACKER_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("GOALTRACKER_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Session overrides
        if let Some(data_dir) = var("GOALTRACKER_DATA_DIR") {
            self.session.data_dir = data_dir;
        }

        // Logging overrides
        if let Some(level) = var("GOALTRACKER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("GOALTRACKER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# GoalTracker Configuration
#
# Environment variables override these settings:
# - GOALTRACKER_BACKEND_URL
# - GOALTRACKER_ANON_KEY
# - GOALTRACKER_API_HOST
# - GOALTRACKER_API_PORT
# - GOALTRACKER_DATA_DIR
# - GOALTRACKER_LOG_LEVEL
# - GOALTRACKER_LOG_FORMAT

[backend]
# Hosted project URL. Leave empty to run against the in-memory backend.
url = ""

# Public (anon) API key of the project
anon_key = ""

# Timeout for every backend request (seconds)
request_timeout_secs = 30

[api]
# API server host
host = "127.0.0.1"

# API server port
port = 8085

# Allowed CORS origins
cors_origins = ["http://localhost:5173", "http://127.0.0.1:5173"]

[session]
# Directory for remembered sessions and activity logs
data_dir = "~/.local/share/goaltracker"

# Keep "remember me" sign-ins across restarts
persist_sessions = true

[search]
# Delay before a user search is sent (ms)
debounce_ms = 300

# Results per search page
page_size = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/goaltracker/goaltracker.log"
"#
    .to_string()
}
