/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Error taxonomy for the relay pipeline.
//!
//! Every webhook and completion handler resolves to either a success summary
//! or one of these variants; nothing else escapes to the transport layer.
//! `Validation` deliberately maps to 200: providers retry deliveries on
//! non-2xx responses, and a structurally unusable payload will not get better
//! on retry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing or revoked provider authorization; the user must re-authorize.
    #[error("{0}")]
    Auth(String),

    /// Unknown hook record or commit.
    #[error("{0}")]
    NotFound(String),

    /// A build manifest failed to parse; nothing was submitted.
    #[error("There are errors in {file}:\n{reason}")]
    Manifest { file: String, reason: String },

    /// Webhook payload is missing required fields; acknowledged, not retried.
    #[error("{0}")]
    Validation(String),

    /// The build service rejected a job; body is surfaced verbatim.
    #[error("{0}")]
    Submission(String),

    /// Completion callback token failed authentication or decoding.
    #[error("invalid notification token")]
    InvalidToken,

    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Auth(_) => StatusCode::UNAUTHORIZED,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Manifest { .. } => StatusCode::BAD_REQUEST,
            RelayError::Validation(_) => StatusCode::OK,
            RelayError::Submission(_) => StatusCode::BAD_REQUEST,
            RelayError::InvalidToken => StatusCode::BAD_REQUEST,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

impl From<diesel::result::Error> for RelayError {
    fn from(e: diesel::result::Error) -> Self {
        RelayError::Internal(format!("database error: {}", e))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Internal(format!("http error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_acknowledged_with_200() {
        let err = RelayError::Validation("Got request, but it has no commits".to_string());
        assert_eq!(err.status_code(), StatusCode::OK);
    }

    #[test]
    fn test_manifest_error_carries_file_and_reason() {
        let err = RelayError::Manifest {
            file: "a.yml".to_string(),
            reason: "mapping values are not allowed here".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let text = err.to_string();
        assert!(text.contains("a.yml"));
        assert!(text.contains("mapping values"));
    }

    #[test]
    fn test_invalid_token_is_generic() {
        // The response must not leak why decoding failed.
        assert_eq!(
            RelayError::InvalidToken.to_string(),
            "invalid notification token"
        );
    }
}
