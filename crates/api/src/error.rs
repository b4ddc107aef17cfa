//! Error to HTTP response mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docrelay_shared::AppError;

/// Wraps [`AppError`] so handlers can return it directly.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let code = err.error_code();

        match &err {
            AppError::MissingFileUrl | AppError::InvalidFileUrl(_) => {
                tracing::debug!(code, "Client error: {}", err);
            }
            AppError::Timeout { .. }
            | AppError::PayloadTooLarge(_)
            | AppError::ExternalService { .. } => {
                tracing::warn!(code, "Upstream error: {}", err);
            }
            AppError::MissingConfiguration(_) | AppError::FileSystem(_) | AppError::Internal(_) => {
                tracing::error!(code, "Internal service error: {}", err);
            }
        }

        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(err.response_body())).into_response()
    }
}
