//! API route definitions.

use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::AppState;

pub mod health;
pub mod process_file;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(process_file::routes())
}

/// Fallback for unmatched routes and methods.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
