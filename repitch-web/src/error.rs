//! JSON error responses for the HTTP API.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use repitch_core::{DeriveError, KeyError, LibraryError, RangeError, ServeError};
use serde_json::json;

/// Failure of an API request, rendered as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error(transparent)]
    Path(#[from] PathRejection),

    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Serve(#[from] ServeError),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl ApiError {
    /// Shorthand for a 400 response.
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    /// Shorthand for a 404 response.
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound {
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::Key(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Json(rejection) => rejection.status(),
            ApiError::Query(rejection) => rejection.status(),
            ApiError::Path(rejection) => rejection.status(),
            ApiError::Derive(e) => match e {
                DeriveError::InvalidPath { .. } | DeriveError::ArtifactMissing { .. } => {
                    StatusCode::NOT_FOUND
                }
                DeriveError::NoAudioStream { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DeriveError::DestinationWrite { .. } => StatusCode::INSUFFICIENT_STORAGE,
                DeriveError::ExternalTool { .. }
                | DeriveError::ToolLaunch { .. }
                | DeriveError::EmptyOutput { .. }
                | DeriveError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Range(RangeError::NotSatisfiable { .. }) => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Range(_) => StatusCode::BAD_REQUEST,
            ApiError::Serve(ServeError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Serve(_) | ApiError::Library(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type of API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use repitch_core::{ArtifactKind, CacheKey};

    use super::*;

    #[test]
    fn test_status_for_derive_errors() {
        let no_audio = ApiError::from(DeriveError::NoAudioStream {
            path: PathBuf::from("/videos/silent.mp4"),
        });
        let tool = ApiError::from(DeriveError::ExternalTool {
            tool: "sox".to_string(),
            exit_code: Some(2),
            stderr: "boom".to_string(),
        });
        let destination = ApiError::from(DeriveError::DestinationWrite {
            path: PathBuf::from("/readonly"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        let missing = ApiError::from(DeriveError::ArtifactMissing {
            kind: ArtifactKind::Audio,
            key: CacheKey::derive(std::path::Path::new("/v.mp4"), std::time::UNIX_EPOCH),
        });

        assert_eq!(no_audio.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(tool.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(destination.status(), StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_status_for_request_errors() {
        let key = ApiError::from(KeyError::InvalidKey {
            raw: "../etc".to_string(),
        });
        let range = ApiError::from(RangeError::NotSatisfiable { total_size: 10 });

        assert_eq!(key.status(), StatusCode::BAD_REQUEST);
        assert_eq!(range.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
    }
}
