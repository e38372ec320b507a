//! Server errors and their HTTP rendering

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Response, StatusCode};
use quill_core::QuillError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const CURRENT_VERSION_HEADER: &str = "x-current-version";

/// Startup and transport failures
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Quill(#[from] QuillError),
}

/// Everything a handler can fail with, before it is rendered
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Quill(#[from] QuillError),

    #[error("Could not read request body: {0}")]
    BadBody(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Not found")]
    UnknownRoute,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Quill(e) => match e {
                QuillError::Unauthenticated => StatusCode::UNAUTHORIZED,
                QuillError::IdentityConflict => StatusCode::CONFLICT,
                QuillError::NotFound => StatusCode::NOT_FOUND,
                QuillError::VersionConflict { .. } => StatusCode::CONFLICT,
                QuillError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                QuillError::Storage(_)
                | QuillError::Crypto(_)
                | QuillError::Serialization(_)
                | QuillError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnknownRoute => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Quill(e) => match e {
                QuillError::Unauthenticated => "UNAUTHENTICATED",
                QuillError::IdentityConflict => "IDENTITY_CONFLICT",
                QuillError::NotFound => "NOT_FOUND",
                QuillError::VersionConflict { .. } => "VERSION_CONFLICT",
                QuillError::Validation(_) => "VALIDATION_ERROR",
                _ => "INTERNAL_ERROR",
            },
            ApiError::BadBody(_) => "BAD_REQUEST",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::UnknownRoute => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }

    /// Render as a `{detail, error_code}` JSON response
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();

        // Server-side faults are logged in full and hidden from the caller.
        let detail = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "detail": detail,
            "error_code": self.error_code(),
        });
        if let ApiError::Quill(QuillError::VersionConflict { current }) = &self {
            body["current_version"] = json!(current.get());
        }

        let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match &self {
            ApiError::Quill(QuillError::Unauthenticated) => {
                headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            ApiError::Quill(QuillError::VersionConflict { current }) => {
                headers.insert(CURRENT_VERSION_HEADER, HeaderValue::from(current.get()));
            }
            _ => {}
        }

        response
    }
}
