//! File relay route.
//!
//! `POST /process-file` downloads the file at `fileUrl`, sends it to the
//! extraction service, and answers with the extraction JSON (passthrough mode)
//! or with the public URL the JSON was stored under (store mode).

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
    routing::post,
};
use docrelay_core::relay::{RelayOutcome, parse_file_url};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{AppState, error::ApiError, routes::not_found};

/// Creates the relay route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/process-file", post(process_file).fallback(not_found))
}

/// Response for a result written to object storage.
#[derive(Debug, Serialize)]
pub struct StoredResponse {
    /// Fixed confirmation message.
    pub message: &'static str,
    /// Public URL of the stored result.
    pub url: String,
}

const STORED_MESSAGE: &str = "File processed and stored successfully";

/// POST `/process-file`
async fn process_file(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    // An unreadable body has no fileUrl either.
    let body = payload.map_or_else(
        |rejection| {
            debug!(error = %rejection, "Request body is not JSON");
            Value::Null
        },
        |Json(body)| body,
    );

    let url = parse_file_url(body.get("fileUrl"))?;

    let response = match state.relay.process(&url).await? {
        RelayOutcome::Extracted(result) => Json(result).into_response(),
        RelayOutcome::Stored(artifact) => Json(StoredResponse {
            message: STORED_MESSAGE,
            url: artifact.public_url,
        })
        .into_response(),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use docrelay_core::relay::{ExtractionClient, Fetcher, RelayService, Stager};
    use docrelay_core::storage::{StorageConfig, StorageProvider, StorageService};
    use docrelay_shared::RelayMode;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CDN: &str = "https://cdn.example.com";

    fn relay(server: &MockServer, mode: RelayMode, scratch: &Path, timeout: Duration) -> RelayService {
        let fetcher = Fetcher::new(10 * 1024 * 1024, timeout).expect("fetcher");
        let extraction = ExtractionClient::new(
            format!("{}/general/v0/general", server.uri()),
            "test-key",
            "unstructured-api-key",
            Duration::from_secs(5),
        )
        .expect("extraction client");

        RelayService::new(mode, fetcher, Stager::new(scratch)).with_extraction(extraction)
    }

    fn passthrough_app(server: &MockServer, scratch: &Path) -> Router {
        create_router(AppState::new(relay(
            server,
            RelayMode::Passthrough,
            scratch,
            Duration::from_secs(5),
        )))
    }

    fn store_app(server: &MockServer, scratch: &Path, bucket: &Path) -> Router {
        let storage = StorageService::from_config(StorageConfig::new(
            StorageProvider::local_fs(bucket),
            CDN,
        ))
        .expect("storage");

        let relay = relay(server, RelayMode::Store, scratch, Duration::from_secs(5))
            .with_storage(Arc::new(storage));
        create_router(AppState::new(relay))
    }

    async fn mount_source(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 hello".to_vec()))
            .mount(server)
            .await;
    }

    async fn mount_extraction(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/general/v0/general"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn post(app: Router, body: String) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/process-file")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn file_url_body(server: &MockServer) -> String {
        json!({ "fileUrl": format!("{}/doc.pdf", server.uri()) }).to_string()
    }

    fn is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_missing_file_url_returns_400_without_network() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(passthrough_app(&server, scratch.path()), "{}".into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "fileUrl is required" }));
        assert!(is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_invalid_file_url_returns_400() {
        let server = MockServer::start().await;
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(
            passthrough_app(&server, scratch.path()),
            json!({ "fileUrl": "not-a-url" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid fileUrl format" }));
        assert!(is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_unparseable_body_counts_as_missing_file_url() {
        let server = MockServer::start().await;
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(passthrough_app(&server, scratch.path()), "{not json".into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "fileUrl is required" }));
    }

    #[tokio::test]
    async fn test_missing_configuration_returns_500_without_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let scratch = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).unwrap();
        let app = create_router(AppState::new(RelayService::new(
            RelayMode::Passthrough,
            fetcher,
            Stager::new(scratch.path()),
        )));

        let (status, body) = post(app, file_url_body(&server)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "API configuration is missing" }));
    }

    #[tokio::test]
    async fn test_client_error_checked_before_configuration() {
        let scratch = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(1024, Duration::from_secs(5)).unwrap();
        let app = create_router(AppState::new(RelayService::new(
            RelayMode::Passthrough,
            fetcher,
            Stager::new(scratch.path()),
        )));

        let (status, _) = post(app, "{}".into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_timeout_returns_504_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"%PDF".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        let scratch = tempfile::tempdir().unwrap();
        let app = create_router(AppState::new(relay(
            &server,
            RelayMode::Passthrough,
            scratch.path(),
            Duration::from_millis(200),
        )));

        let (status, body) = post(app, file_url_body(&server)).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body, json!({ "error": "Request timeout" }));
        assert!(is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_downstream_error_returns_502_and_cleans_up() {
        let server = MockServer::start().await;
        mount_source(&server).await;
        mount_extraction(
            &server,
            ResponseTemplate::new(500).set_body_json(json!({ "detail": "worker crashed" })),
        )
        .await;
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(passthrough_app(&server, scratch.path()), file_url_body(&server)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body,
            json!({ "error": "External service error", "details": { "detail": "worker crashed" } })
        );
        assert!(is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_downstream_413_returns_413() {
        let server = MockServer::start().await;
        mount_source(&server).await;
        mount_extraction(&server, ResponseTemplate::new(413)).await;
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(passthrough_app(&server, scratch.path()), file_url_body(&server)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({ "error": "File too large" }));
        assert!(is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_passthrough_returns_extraction_json_verbatim() {
        let server = MockServer::start().await;
        mount_source(&server).await;
        mount_extraction(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "elements": [{ "text": "hello" }] })),
        )
        .await;
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(passthrough_app(&server, scratch.path()), file_url_body(&server)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "elements": [{ "text": "hello" }] }));
        assert!(is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_store_mode_returns_public_url() {
        let server = MockServer::start().await;
        mount_source(&server).await;
        mount_extraction(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "elements": [{ "text": "hello" }] })),
        )
        .await;
        let scratch = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();

        let (status, body) = post(
            store_app(&server, scratch.path(), bucket.path()),
            file_url_body(&server),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "File processed and stored successfully");

        let url = body["url"].as_str().unwrap();
        let key = url.strip_prefix("https://cdn.example.com/").unwrap();
        let timestamp = key.strip_suffix("-converted.json").unwrap();
        assert!(timestamp.parse::<i64>().is_ok(), "key: {key}");

        let stored = std::fs::read(bucket.path().join(key)).unwrap();
        let parsed: Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(parsed, json!({ "elements": [{ "text": "hello" }] }));
        assert!(is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_repeated_requests_use_distinct_keys() {
        let server = MockServer::start().await;
        mount_source(&server).await;
        mount_extraction(&server, ResponseTemplate::new(200).set_body_json(json!({ "elements": [] }))).await;
        let scratch = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        let app = store_app(&server, scratch.path(), bucket.path());

        let (first_status, first) = post(app.clone(), file_url_body(&server)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (second_status, second) = post(app, file_url_body(&server)).await;

        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_ne!(first["url"], second["url"]);
        assert_eq!(std::fs::read_dir(bucket.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_get_on_relay_route_is_404() {
        let server = MockServer::start().await;
        let scratch = tempfile::tempdir().unwrap();

        let response = passthrough_app(&server, scratch.path())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/process-file")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
