//! Relay service: one request, start to finish.

use std::sync::Arc;

use docrelay_shared::{AppConfig, AppError, AppResult, RelayMode};
use reqwest::Url;
use serde_json::Value;
use tracing::{info, warn};

use super::extraction::ExtractionClient;
use super::fetch::Fetcher;
use super::staging::{StagedFile, Stager};
use crate::storage::{StorageConfig, StorageService, StoredArtifact};

/// Result of a successful relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Passthrough mode: the extraction JSON itself.
    Extracted(Value),
    /// Store mode: where the extraction JSON was written.
    Stored(StoredArtifact),
}

/// Runs the relay pipeline.
///
/// Built once at startup and shared between requests; it holds no per-request
/// state.
pub struct RelayService {
    mode: RelayMode,
    fetcher: Fetcher,
    stager: Stager,
    extraction: Option<ExtractionClient>,
    storage: Option<Arc<StorageService>>,
    missing: Vec<&'static str>,
}

impl RelayService {
    /// Create a service from explicit parts.
    #[must_use]
    pub fn new(mode: RelayMode, fetcher: Fetcher, stager: Stager) -> Self {
        Self {
            mode,
            fetcher,
            stager,
            extraction: None,
            storage: None,
            missing: vec!["extraction.api_url", "extraction.api_key"],
        }
    }

    /// Build the service from application configuration.
    ///
    /// Missing extraction or storage settings do not fail startup; requests
    /// are answered with a configuration error instead.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let relay = &config.relay;
        let fetcher = Fetcher::new(relay.max_download_bytes, relay.download_timeout())?;
        let stager = Stager::new(relay.scratch_dir());

        let mut service = Self::new(relay.mode, fetcher, stager);
        service.missing = config.missing_settings();

        if let (Some(url), Some(key)) = (config.extraction.api_url(), config.extraction.api_key()) {
            service.extraction = Some(ExtractionClient::new(
                url,
                key,
                &config.extraction.api_key_header,
                relay.extraction_timeout(),
            )?);
        }

        if relay.mode == RelayMode::Store && config.storage.missing().is_empty() {
            let storage = StorageConfig::from_settings(&config.storage)
                .and_then(StorageService::from_config)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            service.storage = Some(Arc::new(storage));
        }

        if !service.missing.is_empty() {
            warn!(
                mode = relay.mode.as_str(),
                missing = ?service.missing,
                "Relay is missing configuration; requests will fail until it is provided"
            );
        }

        Ok(service)
    }

    /// Use `client` for extraction calls.
    #[must_use]
    pub fn with_extraction(mut self, client: ExtractionClient) -> Self {
        self.extraction = Some(client);
        self.missing.retain(|name| !name.starts_with("extraction."));
        self
    }

    /// Publish results through `storage`.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<StorageService>) -> Self {
        self.storage = Some(storage);
        self.missing.retain(|name| !name.starts_with("storage."));
        self
    }

    /// Active relay mode.
    #[must_use]
    pub const fn mode(&self) -> RelayMode {
        self.mode
    }

    /// Settings still missing for the active mode.
    #[must_use]
    pub fn missing_settings(&self) -> &[&'static str] {
        &self.missing
    }

    /// Check that everything the active mode needs is configured.
    fn ensure_configured(&self) -> AppResult<(&ExtractionClient, Option<&StorageService>)> {
        let missing = || AppError::MissingConfiguration(self.missing.clone());

        let extraction = self.extraction.as_ref().ok_or_else(missing)?;
        let storage = match self.mode {
            RelayMode::Passthrough => None,
            RelayMode::Store => Some(self.storage.as_deref().ok_or_else(missing)?),
        };

        Ok((extraction, storage))
    }

    /// Relay the file at `url`.
    ///
    /// Configuration is checked before anything touches the network. The
    /// staged file is removed before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`AppError`] of the first stage that fails.
    pub async fn process(&self, url: &Url) -> AppResult<RelayOutcome> {
        let (extraction, storage) = self.ensure_configured()?;

        let fetched = self.fetcher.fetch(url).await?;
        let staged = self
            .stager
            .stage(&fetched.bytes, &fetched.base_name)
            .await?;
        drop(fetched);

        let outcome = Self::deliver(extraction, storage, &staged).await;
        if outcome.is_ok() {
            info!(
                url = %url,
                file = staged.file_name(),
                mode = self.mode.as_str(),
                "File relayed"
            );
        }

        staged.remove().await;
        outcome
    }

    /// Extract `staged` and, in store mode, publish the result.
    async fn deliver(
        extraction: &ExtractionClient,
        storage: Option<&StorageService>,
        staged: &StagedFile,
    ) -> AppResult<RelayOutcome> {
        let result = extraction.extract(staged).await?;

        Ok(match storage {
            None => RelayOutcome::Extracted(result),
            Some(storage) => RelayOutcome::Stored(storage.publish_json(&result).await?),
        })
    }
}
