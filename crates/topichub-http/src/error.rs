use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use topichub_core::error::Error;

/// Error half of every handler: a taxonomy error rendered as `{code, message}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidInput(_)
        | Error::TooFewTexts { .. }
        | Error::TooManyTexts { .. }
        | Error::InvalidGranularity(_) => StatusCode::BAD_REQUEST,
        Error::JobNotFound(_) | Error::CachedJobNotFound(_) | Error::NotAvailable(_) => StatusCode::NOT_FOUND,
        Error::Conflict { .. } => StatusCode::CONFLICT,
        Error::QueueFull(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::BackendRequired(_) => StatusCode::NOT_IMPLEMENTED,
        Error::LlmUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::invalid(rejection.body_text()))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        tracing::error!(error = %e, "response encoding failed");
        Self(Error::pipeline("response encoding"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            tracing::debug!(code = self.0.code(), error = %self.0, "request rejected");
        }
        (status, Json(ErrorBody { code: self.0.code(), message: self.0.to_string() })).into_response()
    }
}
