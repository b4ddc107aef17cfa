//! Application-wide error types.
//!
//! Every stage of the relay pipeline reports failures as an [`AppError`]
//! variant. The status code and the JSON body a caller sees are decided here,
//! in one place, rather than by the handler.

use serde_json::{Value, json};
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request carried no `fileUrl`.
    #[error("fileUrl is required")]
    MissingFileUrl,

    /// `fileUrl` is not an absolute http(s) URL.
    #[error("Invalid fileUrl format: {0}")]
    InvalidFileUrl(String),

    /// A setting required by the active relay mode is absent.
    #[error("Missing configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),

    /// A network stage exceeded its time budget.
    #[error("{stage} timed out after {secs}s")]
    Timeout {
        /// Stage that timed out.
        stage: &'static str,
        /// Configured budget in seconds.
        secs: u64,
    },

    /// Content exceeded the size bound, locally or at the extraction service.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Staging file could not be created or read.
    #[error("File system error: {0}")]
    FileSystem(String),

    /// The origin, extraction service or object store failed.
    #[error("External service error: {message}")]
    ExternalService {
        /// Short description of what failed.
        message: String,
        /// Downstream response body, when one was received.
        details: Option<Value>,
    },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create an external service error without a downstream body.
    #[must_use]
    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
            details: None,
        }
    }

    /// Create an external service error carrying the downstream body.
    #[must_use]
    pub fn external_with_details(message: impl Into<String>, details: Value) -> Self {
        Self::ExternalService {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingFileUrl | Self::InvalidFileUrl(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::ExternalService { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::MissingConfiguration(_) | Self::FileSystem(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code used in logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFileUrl => "MISSING_FILE_URL",
            Self::InvalidFileUrl(_) => "INVALID_FILE_URL",
            Self::MissingConfiguration(_) => "CONFIGURATION_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::FileSystem(_) => "FILE_SYSTEM_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller, not the deployment, is at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingFileUrl | Self::InvalidFileUrl(_))
    }

    /// JSON body returned to the caller.
    ///
    /// Setting names and scratch paths stay in the logs; the caller only
    /// learns which kind of failure happened.
    #[must_use]
    pub fn response_body(&self) -> Value {
        match self {
            Self::MissingFileUrl => json!({ "error": "fileUrl is required" }),
            Self::InvalidFileUrl(_) => json!({ "error": "Invalid fileUrl format" }),
            Self::MissingConfiguration(_) => json!({ "error": "API configuration is missing" }),
            Self::Timeout { .. } => json!({ "error": "Request timeout" }),
            Self::PayloadTooLarge(_) => json!({ "error": "File too large" }),
            Self::FileSystem(_) => json!({
                "error": "Internal server error",
                "message": "Failed to create or access temporary file",
            }),
            Self::ExternalService { message, details } => json!({
                "error": "External service error",
                "details": details.clone().unwrap_or_else(|| Value::String(message.clone())),
            }),
            Self::Internal(detail) => json!({
                "error": "Internal server error",
                "message": detail,
            }),
        }
    }
}
