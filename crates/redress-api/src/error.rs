use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use redress_db::DbError;

/// Request-level error taxonomy. Every variant renders as a JSON body
/// `{"error": "..."}` with the matching status code; internal failures are
/// logged but never leak their message to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            DbError::InvalidState(msg) => ApiError::InvalidState(msg),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(source) => {
                error!("internal error: {:#}", source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_onto_the_api_taxonomy() {
        let err: ApiError = DbError::NotFound("Complaint not found with ID: 7".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = DbError::Conflict("duplicate".into()).into();
        assert!(matches!(err, ApiError::Conflict(_)));

        let err: ApiError = DbError::InvalidState("inactive".into()).into();
        assert!(matches!(err, ApiError::InvalidState(_)));

        let err: ApiError = DbError::LockPoisoned.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ApiError::Internal(anyhow::anyhow!("secret connection string"));
        assert_eq!(err.to_string(), "internal server error");
    }
}
