//! Storage service implementation using Apache OpenDAL.

use chrono::Utc;
use opendal::{Operator, services};
use serde_json::Value;
use tracing::info;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// A stored extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Object key.
    pub key: String,
    /// Bucket the object was written to.
    pub bucket: String,
    /// Public URL the object is served from.
    pub public_url: String,
}

/// Storage service for extraction results.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
        }
    }

    /// Generate the object key for a result stored at `timestamp_ms`.
    ///
    /// Format: `{timestamp_ms}{key_suffix}`
    #[must_use]
    pub fn generate_key(&self, timestamp_ms: i64) -> String {
        format!("{timestamp_ms}{}", self.config.key_suffix)
    }

    /// Public URL for an object key.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            key
        )
    }

    /// Serialize `result` and store it under a fresh timestamped key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the upload fails.
    pub async fn publish_json(&self, result: &Value) -> Result<StoredArtifact, StorageError> {
        self.publish_json_at(result, Utc::now().timestamp_millis())
            .await
    }

    /// Serialize `result` and store it under the key for `timestamp_ms`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the upload fails.
    pub async fn publish_json_at(
        &self,
        result: &Value,
        timestamp_ms: i64,
    ) -> Result<StoredArtifact, StorageError> {
        let body = serde_json::to_vec(result)?;
        let size = body.len();
        let key = self.generate_key(timestamp_ms);

        // The fs provider cannot record a content type and rejects the option.
        let capability = self.operator.info().full_capability();
        if capability.write_with_content_type {
            self.operator
                .write_with(&key, body)
                .content_type(JSON_CONTENT_TYPE)
                .await
                .map(|_| ())?;
        } else {
            self.operator.write(&key, body).await.map(|_| ())?;
        }

        let artifact = StoredArtifact {
            public_url: self.public_url(&key),
            bucket: self.bucket().to_string(),
            key,
        };

        info!(
            provider = self.provider_name(),
            bucket = %artifact.bucket,
            key = %artifact.key,
            size,
            "Extraction result stored"
        );

        Ok(artifact)
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }
}

/// Extension trait for pipe operator.
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}
