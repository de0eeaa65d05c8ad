//! Application configuration with layered loading.
//!
//! Uses figment to merge, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if TASKCACHE_CONFIG_FILE set)
//! 3. Environment variables (TASKCACHE_*)

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via TASKCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the task reminder front end. Relative request paths resolve
    /// against it and only responses from it are cached.
    ///
    /// Set via TASKCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Name of the current cache generation. Every other store is stale.
    ///
    /// Set via TASKCACHE_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Resources that must be in the store once install completes.
    #[serde(default = "default_seed_urls")]
    pub seed_urls: Vec<String>,

    /// Background sync tag handled by the agent.
    ///
    /// Set via TASKCACHE_SYNC_TAG environment variable.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest response body, in bytes, kept in the cache.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Run install then activate as soon as the host starts.
    #[serde(default = "default_true")]
    pub lifecycle_on_start: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./taskcache.sqlite")
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_generation() -> String {
    "task-reminder-v1".into()
}

fn default_seed_urls() -> Vec<String> {
    ["/", "/static/styles.css", "/static/manifest.json", "/static/icon-192.png", "/static/icon-512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sync_tag() -> String {
    "sync-tasks".into()
}

fn default_user_agent() -> String {
    "taskcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            generation: default_generation(),
            seed_urls: default_seed_urls(),
            sync_tag: default_sync_tag(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            lifecycle_on_start: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TASKCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TASKCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
