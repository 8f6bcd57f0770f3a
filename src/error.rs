use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Every way a generate/edit request can fail. Orchestration failures all
/// surface to the client as one "request failed" class (400); `kind` keeps
/// them apart in logs and in the error body.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
    #[error("Invalid request: {0}")] InvalidRequest(String),
    #[error("Template image not found: {0}")] ImageNotFound(String),
    #[error("Failed to fetch image {url}: {reason}")] ImageFetchFailed { url: String, reason: String },
    #[error("Invalid image data for {0}")] InvalidImageData(String),
    #[error("Prompt refinement failed: {0}")] UpstreamModel(String),
    #[error("Image generation failed: {0}")] UpstreamImage(String),
    #[error("Upstream request timed out: {0}")] UpstreamTimeout(String),
    #[error("Image API returned no image data")] NoImageData,
    #[error("No credits remaining for {0}")] NoCredits(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::ImageNotFound(_) => "image_not_found",
            AppError::ImageFetchFailed { .. } => "image_fetch_failed",
            AppError::InvalidImageData(_) => "invalid_image_data",
            AppError::UpstreamModel(_) => "upstream_model_error",
            AppError::UpstreamImage(_) => "upstream_image_error",
            AppError::UpstreamTimeout(_) => "upstream_timeout",
            AppError::NoImageData => "no_image_data",
            AppError::NoCredits(_) => "no_credits",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoCredits(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Maps a reqwest failure, keeping timeouts distinct from the stage's own error.
    pub fn from_reqwest(err: reqwest::Error, wrap: impl FnOnce(String) -> AppError) -> AppError {
        if err.is_timeout() {
            AppError::UpstreamTimeout(err.to_string())
        } else {
            wrap(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "message": self.to_string(), "kind": self.kind() }));
        (self.status(), body).into_response()
    }
}
