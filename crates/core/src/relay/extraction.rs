//! Extraction service client.

use std::time::Duration;

use docrelay_shared::{AppError, AppResult};
use reqwest::header::{ACCEPT, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::{body_as_json, downstream_error};
use super::staging::StagedFile;

/// Multipart field the staged file is sent in.
const FILE_FIELD: &str = "files";

/// Posts staged files to the extraction service.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    client: Client,
    endpoint: String,
    key_header: HeaderName,
    key_value: HeaderValue,
    timeout: Duration,
}

impl ExtractionClient {
    /// Create a client for `endpoint`, authenticating with `api_key` sent in
    /// the `key_header` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or key is not a valid HTTP header,
    /// or the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: &str,
        key_header: &str,
        timeout: Duration,
    ) -> AppResult<Self> {
        let key_header = HeaderName::from_bytes(key_header.as_bytes())
            .map_err(|e| AppError::Internal(format!("invalid api key header name: {e}")))?;
        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|e| AppError::Internal(format!("invalid api key header value: {e}")))?;
        key_value.set_sensitive(true);

        // No request body cap: size was already bounded at download time.
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build extraction client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            key_header,
            key_value,
            timeout,
        })
    }

    /// Send `staged` to the extraction service and return its JSON answer.
    ///
    /// A 2xx body that is not JSON is returned as a JSON string.
    ///
    /// # Errors
    ///
    /// - [`AppError::FileSystem`] if the staged file cannot be opened
    /// - [`AppError::PayloadTooLarge`] if the service answers 413
    /// - [`AppError::Timeout`] if the call exceeds its budget
    /// - [`AppError::ExternalService`] for other failures and non-2xx answers
    pub async fn extract(&self, staged: &StagedFile) -> AppResult<Value> {
        let file = tokio::fs::File::open(staged.path())
            .await
            .map_err(|e| AppError::FileSystem(format!("{}: {e}", staged.path().display())))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| AppError::FileSystem(format!("{}: {e}", staged.path().display())))?
            .len();

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(staged.file_name().to_string());
        let form = Form::new().part(FILE_FIELD, part);

        debug!(
            endpoint = %self.endpoint,
            file = staged.file_name(),
            bytes = len,
            "Forwarding file to extraction service"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(self.key_header.clone(), self.key_value.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(AppError::PayloadTooLarge(format!(
                "extraction service rejected {} ({len} bytes)",
                staged.file_name()
            )));
        }

        if !status.is_success() {
            warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "Extraction service returned an error"
            );
            return Err(downstream_error(
                response,
                usize::MAX,
                format!("extraction service returned HTTP {status}"),
            )
            .await);
        }

        let body = response.text().await.map_err(|e| self.classify(&e))?;
        Ok(body_as_json(body))
    }

    fn classify(&self, err: &reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::Timeout {
                stage: "extraction",
                secs: self.timeout.as_secs(),
            }
        } else {
            AppError::external(format!("extraction request failed: {err}"))
        }
    }
}
