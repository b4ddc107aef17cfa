//! Bounded download of the source file.
//!
//! Two independent caps apply: a wall-clock timeout covering connect, headers
//! and body, and a byte limit checked against `Content-Length` up front and
//! again while the body streams in. Either one aborts the download; nothing is
//! returned partially.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use docrelay_shared::{AppError, AppResult};
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use super::downstream_error;

/// Base name used when the URL path has no final segment.
const FALLBACK_NAME: &str = "download";

/// A downloaded source file.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    /// File contents.
    pub bytes: Bytes,
    /// Sanitized base name taken from the URL path.
    pub base_name: String,
}

/// Downloads source files within a size and time budget.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_bytes: u64,
    timeout: Duration,
}

impl Fetcher {
    /// Create a fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(max_bytes: u64, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build download client: {e}")))?;

        Ok(Self {
            client,
            max_bytes,
            timeout,
        })
    }

    /// Download `url`.
    ///
    /// # Errors
    ///
    /// - [`AppError::Timeout`] if the download exceeds its budget
    /// - [`AppError::PayloadTooLarge`] if the content exceeds `max_bytes`
    /// - [`AppError::ExternalService`] for transport failures and non-2xx answers
    pub async fn fetch(&self, url: &Url) -> AppResult<FetchedFile> {
        info!(url = %url, "Downloading source file");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Source download rejected");
            let limit = usize::try_from(self.max_bytes).unwrap_or(usize::MAX);
            return Err(
                downstream_error(response, limit, format!("source returned HTTP {status}")).await,
            );
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(self.too_large(declared));
            }
        }

        let mut buf = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(&e))? {
            let received = (buf.len() + chunk.len()) as u64;
            if received > self.max_bytes {
                return Err(self.too_large(received));
            }
            buf.extend_from_slice(&chunk);
        }

        let fetched = FetchedFile {
            bytes: buf.freeze(),
            base_name: base_name(url),
        };
        debug!(
            url = %url,
            bytes = fetched.bytes.len(),
            base_name = %fetched.base_name,
            "Source file downloaded"
        );

        Ok(fetched)
    }

    fn classify(&self, err: &reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::Timeout {
                stage: "download",
                secs: self.timeout.as_secs(),
            }
        } else {
            AppError::external(format!("failed to download source file: {err}"))
        }
    }

    fn too_large(&self, size: u64) -> AppError {
        AppError::PayloadTooLarge(format!(
            "source is at least {size} bytes, limit is {} bytes",
            self.max_bytes
        ))
    }
}

/// Sanitized last path segment of `url`, ignoring the query string.
///
/// Only ASCII alphanumerics, dots, hyphens and underscores survive; anything
/// else becomes `_`. Falls back to `download` when there is no segment.
#[must_use]
pub fn base_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    if segment.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    #[rstest]
    #[case::plain("https://example.com/doc.pdf", "doc.pdf")]
    #[case::query_ignored("https://example.com/a/b/report.pdf?sig=1&x=2", "report.pdf")]
    #[case::fragment_ignored("https://example.com/report.pdf#page=2", "report.pdf")]
    #[case::spaces("https://example.com/my%20file%20(1).pdf", "my_20file_20_1_.pdf")]
    #[case::trailing_slash("https://example.com/files/", "download")]
    #[case::root("https://example.com", "download")]
    fn test_base_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(base_name(&url(input)), expected);
    }

    #[tokio::test]
    async fn test_fetch_returns_bytes_and_name() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 body".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).expect("client");
        let fetched = fetcher
            .fetch(&url(&format!("{}/files/doc.pdf?token=abc", mock_server.uri())))
            .await
            .expect("download should succeed");

        assert_eq!(&fetched.bytes[..], b"%PDF-1.7 body");
        assert_eq!(fetched.base_name, "doc.pdf");
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).expect("client");
        let err = fetcher
            .fetch(&url(&format!("{}/big.bin", mock_server.uri())))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PayloadTooLarge(_)), "got: {err:?}");
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn test_fetch_accepts_body_at_limit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).expect("client");
        let fetched = fetcher
            .fetch(&url(&format!("{}/exact.bin", mock_server.uri())))
            .await
            .expect("body at the limit is accepted");

        assert_eq!(fetched.bytes.len(), 1024);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(1024, Duration::from_millis(200)).expect("client");
        let err = fetcher
            .fetch(&url(&format!("{}/slow.pdf", mock_server.uri())))
            .await
            .unwrap_err();

        assert!(
            matches!(err, AppError::Timeout { stage: "download", .. }),
            "got: {err:?}"
        );
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_external_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such object"))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).expect("client");
        let err = fetcher
            .fetch(&url(&format!("{}/missing.pdf", mock_server.uri())))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
        assert_eq!(err.response_body()["details"], "no such object");
    }

    #[tokio::test]
    async fn test_fetch_error_body_is_capped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("x".repeat(5 * 1024 * 1024)))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).expect("client");
        let err = fetcher
            .fetch(&url(&format!("{}/missing.pdf", mock_server.uri())))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
        let details = err.response_body()["details"]
            .as_str()
            .expect("text details")
            .len();
        assert_eq!(details, 1024);
    }

    #[tokio::test]
    async fn test_fetch_empty_error_body_reports_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).expect("client");
        let err = fetcher
            .fetch(&url(&format!("{}/doc.pdf", mock_server.uri())))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
        assert_eq!(
            err.response_body()["details"],
            "source returned HTTP 503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_external_error() {
        // Bind then drop a listener to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).expect("client");
        let err = fetcher
            .fetch(&url(&format!("http://{addr}/doc.pdf")))
            .await
            .unwrap_err();

        assert!(
            matches!(err, AppError::ExternalService { .. }),
            "got: {err:?}"
        );
    }
}
