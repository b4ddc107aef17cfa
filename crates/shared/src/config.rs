//! Application configuration management.
//!
//! Configuration is read once at startup and never mutated afterwards. Values
//! the relay needs per request (extraction credentials, storage settings) stay
//! optional here so a misconfigured deployment still boots and answers with
//! a configuration error instead of crashing.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Relay pipeline configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Extraction service configuration.
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Object storage configuration (store mode only).
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// What the relay does with a successful extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Return the extraction JSON to the caller as-is.
    #[default]
    Passthrough,
    /// Upload the extraction JSON to object storage and return its public URL.
    Store,
}

impl RelayMode {
    /// Name used in logs and the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Store => "store",
        }
    }
}

/// Relay pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Deployment variant.
    #[serde(default)]
    pub mode: RelayMode,
    /// Directory for staged downloads. Defaults to the platform temp dir.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Maximum number of bytes accepted from the origin.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
    /// Wall-clock budget for the origin download, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    /// Wall-clock budget for the extraction call, in seconds.
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,
}

fn default_max_download_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_download_timeout() -> u64 {
    5
}

fn default_extraction_timeout() -> u64 {
    30
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: RelayMode::default(),
            scratch_dir: None,
            max_download_bytes: default_max_download_bytes(),
            download_timeout_secs: default_download_timeout(),
            extraction_timeout_secs: default_extraction_timeout(),
        }
    }
}

impl RelayConfig {
    /// Directory staged files are written to.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Download timeout as a [`Duration`].
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Extraction timeout as a [`Duration`].
    #[must_use]
    pub const fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

/// Extraction service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Endpoint the staged file is posted to.
    #[serde(default)]
    pub api_url: Option<String>,
    /// API key sent with every extraction call.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Header carrying the API key.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
}

fn default_api_key_header() -> String {
    "unstructured-api-key".to_string()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            api_key_header: default_api_key_header(),
        }
    }
}

impl ExtractionConfig {
    /// Endpoint, if set to a non-empty value.
    #[must_use]
    pub fn api_url(&self) -> Option<&str> {
        non_empty(self.api_url.as_ref())
    }

    /// API key, if set to a non-empty value.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_ref())
    }
}

/// Object storage backend used in store mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// S3-compatible object storage.
    #[default]
    S3,
    /// A local directory, for development and single-host deployments.
    Fs,
}

/// Object storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Backend results are written to.
    #[serde(default)]
    pub provider: StorageBackend,
    /// Root directory for the `fs` backend.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// S3 endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// S3 region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket results are written to.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Access key ID.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Base URL stored objects are publicly served from.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_region() -> String {
    "auto".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageBackend::default(),
            root: None,
            endpoint: None,
            region: default_region(),
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            public_base_url: None,
        }
    }
}

impl StorageSettings {
    /// Names of settings the selected backend requires that are absent or empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> = match self.provider {
            StorageBackend::S3 => [
                ("storage.endpoint", &self.endpoint),
                ("storage.bucket", &self.bucket),
                ("storage.access_key_id", &self.access_key_id),
                ("storage.secret_access_key", &self.secret_access_key),
            ]
            .into_iter()
            .filter(|(_, value)| non_empty(value.as_ref()).is_none())
            .map(|(name, _)| name)
            .collect(),
            StorageBackend::Fs => self
                .root
                .as_ref()
                .filter(|root| !root.as_os_str().is_empty())
                .map_or_else(|| vec!["storage.root"], |_| Vec::new()),
        };
        if non_empty(self.public_base_url.as_ref()).is_none() {
            missing.push("storage.public_base_url");
        }
        missing
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// `DOCRELAY__*` variables, then the bare `PORT`, `UNSTRUCTURED_API_URL`
    /// and `UNSTRUCTURED_API_KEY` variables older deployments set.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = run_mode();
        let host = if is_production(&run_mode) {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let config = config::Config::builder()
            .set_default("server.host", host)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("DOCRELAY").separator("__"))
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option(
                "extraction.api_url",
                std::env::var("UNSTRUCTURED_API_URL").ok(),
            )?
            .set_override_option(
                "extraction.api_key",
                std::env::var("UNSTRUCTURED_API_KEY").ok(),
            )?
            .build()?;

        config.try_deserialize()
    }

    /// Names of settings the active relay mode needs but does not have.
    #[must_use]
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.extraction.api_url().is_none() {
            missing.push("extraction.api_url");
        }
        if self.extraction.api_key().is_none() {
            missing.push("extraction.api_key");
        }
        if self.relay.mode == RelayMode::Store {
            missing.extend(self.storage.missing());
        }
        missing
    }
}

/// Current run mode (`RUN_MODE`, falling back to `NODE_ENV`, then `development`).
#[must_use]
pub fn run_mode() -> String {
    std::env::var("RUN_MODE")
        .or_else(|_| std::env::var("NODE_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Whether the given run mode is production.
#[must_use]
pub fn is_production(run_mode: &str) -> bool {
    run_mode.eq_ignore_ascii_case("production")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
