//! # Error Handling
//!
//! Custom error types for the HTTP edge and how they become responses.
//!
//! Upload failures that the gateway already classified (bad file, processor
//! down, processor rejected the file) are *not* errors here; they are normal
//! `{success:false,...}` responses built by the upload handler, and a missing
//! download is a plain 404 `{message}` body. `AppError` covers what is left:
//! bad path parameters and cancellation.
//!
//! ## HTTP Status Code Mapping:
//! - BadRequest → 400 (Bad Request)
//! - Unavailable → 503 (Service Unavailable)

use crate::gateway::Cancelled;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Client sent an unusable request
    BadRequest(String),

    /// The request could not be completed right now (cancelled, shutting down)
    Unavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
        }
    }
}

/// All errors return JSON with a consistent structure:
/// ```json
/// {
///   "error": {
///     "type": "bad_request",
///     "message": "Invalid file name '../a.wav'",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_type, message) = match self {
            AppError::BadRequest(msg) => ("bad_request", msg),
            AppError::Unavailable(msg) => ("unavailable", msg),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<Cancelled> for AppError {
    fn from(_: Cancelled) -> Self {
        AppError::Unavailable("Request was cancelled".to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(Cancelled).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_cancellation_message() {
        assert_eq!(
            AppError::from(Cancelled).to_string(),
            "Unavailable: Request was cancelled"
        );
    }

    #[actix_web::test]
    async fn test_error_body_shape() {
        let response = AppError::BadRequest("Invalid file name '../a.wav'".into()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["type"], "bad_request");
        assert_eq!(value["error"]["message"], "Invalid file name '../a.wav'");
        assert!(value["error"]["timestamp"].is_string());
    }
}
