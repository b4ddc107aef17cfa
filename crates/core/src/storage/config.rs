//! Storage configuration types.

use std::path::PathBuf;

use docrelay_shared::{StorageBackend, StorageSettings};

use super::error::StorageError;

/// Storage provider configuration.
#[derive(Debug, Clone)]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, DigitalOcean Spaces
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region.
        region: String,
    },
    /// Local directory, selected with `storage.provider = "fs"`.
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Create S3-compatible provider (Cloudflare R2, Supabase, AWS S3).
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create local filesystem provider.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Get the provider name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "local",
        }
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::LocalFs { root } => root.to_str().unwrap_or("local"),
        }
    }
}

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Base URL stored objects are publicly served from.
    pub public_base_url: String,
    /// Suffix appended to the timestamp to form a key.
    pub key_suffix: String,
}

impl StorageConfig {
    /// Default key suffix.
    pub const DEFAULT_KEY_SUFFIX: &'static str = "-converted.json";

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider, public_base_url: impl Into<String>) -> Self {
        Self {
            provider,
            public_base_url: public_base_url.into(),
            key_suffix: Self::DEFAULT_KEY_SUFFIX.to_string(),
        }
    }

    /// Build a configuration for the backend selected in application settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every missing setting.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let missing = settings.missing();
        if !missing.is_empty() {
            return Err(StorageError::configuration(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        let required = |value: &Option<String>| value.clone().unwrap_or_default();
        let provider = match settings.provider {
            StorageBackend::S3 => StorageProvider::s3(
                required(&settings.endpoint),
                required(&settings.bucket),
                required(&settings.access_key_id),
                required(&settings.secret_access_key),
                settings.region.clone(),
            ),
            StorageBackend::Fs => {
                StorageProvider::local_fs(settings.root.clone().unwrap_or_default())
            }
        };

        Ok(Self::new(provider, required(&settings.public_base_url)))
    }

    /// Set the key suffix.
    #[must_use]
    pub fn with_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = suffix.into();
        self
    }
}
