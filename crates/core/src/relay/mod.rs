//! The relay pipeline.
//!
//! ```text
//! fileUrl
//!  │
//!  ├─ 1. Validate  parse_file_url + configuration check
//!  ├─ 2. Fetch     bounded download (time + size)
//!  ├─ 3. Stage     <millis>-<basename> in the scratch dir
//!  ├─ 4. Extract   multipart upload to the extraction service
//!  ├─ 5. Publish   store mode only: <millis>-converted.json
//!  └─ 6. Cleanup   StagedFile is removed when dropped, on every path
//! ```

mod extraction;
mod fetch;
mod service;
mod staging;

pub use extraction::ExtractionClient;
pub use fetch::{FetchedFile, Fetcher, base_name};
pub use service::{RelayOutcome, RelayService};
pub use staging::{StagedFile, Stager};

use std::num::FpCategory;

use bytes::BytesMut;
use docrelay_shared::{AppError, AppResult};
use reqwest::{Response, Url};
use serde_json::Value;

/// Most bytes of a downstream error body kept for the caller.
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// Validate the raw `fileUrl` value from a request body.
///
/// Absent and falsy values (`null`, `""`, `false`, `0`) count as missing.
/// Anything else must be a string holding an absolute `http` or `https` URL.
pub fn parse_file_url(raw: Option<&Value>) -> AppResult<Url> {
    let raw = match raw {
        None | Some(Value::Null | Value::Bool(false)) => return Err(AppError::MissingFileUrl),
        Some(Value::Number(n)) if n.as_f64().is_some_and(|f| f.classify() == FpCategory::Zero) => {
            return Err(AppError::MissingFileUrl);
        }
        Some(Value::String(s)) if s.is_empty() => return Err(AppError::MissingFileUrl),
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(AppError::InvalidFileUrl(format!(
                "expected a string, got {other}"
            )));
        }
    };

    let url = Url::parse(raw).map_err(|e| AppError::InvalidFileUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AppError::InvalidFileUrl(format!(
            "unsupported scheme '{scheme}'"
        ))),
    }
}

/// Downstream body as JSON when it parses, otherwise as a JSON string.
pub(crate) fn body_as_json(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

/// Error for a non-2xx downstream answer.
///
/// At most `limit` bytes of the body are read; the rest is never pulled off
/// the wire. An empty or unreadable body leaves `message` as the details.
pub(crate) async fn downstream_error(
    mut response: Response,
    limit: usize,
    message: String,
) -> AppError {
    let limit = limit.min(ERROR_BODY_LIMIT);
    let mut buf = BytesMut::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        let room = limit - buf.len();
        if chunk.len() >= room {
            buf.extend_from_slice(&chunk[..room]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    let body = String::from_utf8_lossy(&buf);
    if body.trim().is_empty() {
        AppError::external(message)
    } else {
        AppError::external_with_details(message, body_as_json(body.into_owned()))
    }
}
