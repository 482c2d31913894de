//! HTTP error mapping
//!
//! Translates the domain error taxonomy into status codes with JSON
//! `{"error": ...}` bodies: Validation -> 400, NotFound -> 404,
//! Conflict -> 409, everything else -> 500 (logged, detail withheld).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mentorlink_common::Error;
use serde_json::json;
use tracing::error;

/// Wrapper giving domain errors an HTTP rendering
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            other => {
                error!("Internal error: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("dup".into()), StatusCode::CONFLICT),
            (Error::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
