//! Static configuration management
//!
//! Configuration is loaded once at startup from `config.toml` (optional)
//! with environment variable overrides (prefix `MB`, separator `__`, e.g.
//! `MB__TRACKING__OPEN_DEDUP_WINDOW_SECS=300`).

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global configuration instance
pub fn get_config() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}

/// Initialize the global configuration
///
/// Loads configuration from "config.toml" in the current directory.
/// If the file doesn't exist, uses in-memory defaults.
pub fn init_config() {
    CONFIG.get_or_init(AppConfig::load);
}

/// Static configuration loaded from TOML and environment
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from TOML file and environment variables
    ///
    /// Priority: ENV > config.toml > defaults
    pub fn load() -> Self {
        use config::{Config, Environment, File};

        let path = "config.toml";

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("MB")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<AppConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// Generate a sample TOML configuration
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
}

/// Tracking behavior configuration
///
/// The dedup windows are deployment constants, never request parameters.
/// The open window is materially longer than the click window: mail clients
/// re-fetch preview images aggressively, humans rarely double-click a link
/// within a couple of seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Public base URL the tracking endpoints are reachable at,
    /// e.g. "https://mail.example.com"
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_open_dedup_window_secs")]
    pub open_dedup_window_secs: u64,
    #[serde(default = "default_click_dedup_window_secs")]
    pub click_dedup_window_secs: u64,
    /// Length of generated open/click tokens
    #[serde(default = "default_token_length")]
    pub token_length: usize,
    /// Where to send browsers that hit an unknown click token.
    /// Empty means respond with 404 instead.
    #[serde(default)]
    pub fallback_redirect_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            open_dedup_window_secs: default_open_dedup_window_secs(),
            click_dedup_window_secs: default_click_dedup_window_secs(),
            token_length: default_token_length(),
            fallback_redirect_url: String::new(),
        }
    }
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

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "mailbeacon.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_open_dedup_window_secs() -> u64 {
    120
}

fn default_click_dedup_window_secs() -> u64 {
    5
}

fn default_token_length() -> usize {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.tracking.open_dedup_window_secs, 120);
        assert_eq!(config.tracking.click_dedup_window_secs, 5);
        assert!(config.tracking.open_dedup_window_secs > config.tracking.click_dedup_window_secs);
        assert_eq!(config.tracking.token_length, 32);
        assert!(config.tracking.fallback_redirect_url.is_empty());
    }

    #[test]
    fn test_generate_sample_config() {
        let sample = AppConfig::generate_sample_config();
        assert!(sample.contains("public_base_url"));
        assert!(sample.contains("open_dedup_window_secs"));
    }
}
