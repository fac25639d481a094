//! Error types for Botgate
//!
//! All errors implement `IntoResponse` for Axum handlers.
//!
//! Note that backend-negative outcomes (bot timed out, nothing found,
//! malformed command, anti-spam throttling) are NOT represented here: those
//! are ordinary `AggregatedResult` values with `status = "error"`, returned
//! with HTTP 200 to match the wire contract. `AppError` covers caller
//! mistakes and infrastructure faults only.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Transport session is not authorized")]
    Unauthorized,

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Failed to download media {media_id}: {reason}")]
    Download { media_id: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Self::Transport { .. } | Self::Download { .. } => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Config(_)
            | Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(serde_json::json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_creates() {
        let err = AppError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_validation_error_creates() {
        let err = AppError::Validation("invalid input".to_string());
        assert_eq!(err.to_string(), "Invalid request: invalid input");
    }

    #[test]
    fn test_transport_error_creates() {
        let err = AppError::Transport {
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_download_error_creates() {
        let err = AppError::Download {
            media_id: "abc123".to_string(),
            reason: "404".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to download media abc123: 404");
    }

    #[test]
    fn test_validation_error_response_status() {
        let err = AppError::Validation("test".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_response_status() {
        let err = AppError::Unauthorized;
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_transport_error_response_status() {
        let err = AppError::Transport {
            reason: "test".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_error_response_status() {
        let err = AppError::Internal("test".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
