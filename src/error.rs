// Error taxonomy shared by the rating components and the HTTP layer.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    /// Bad or missing input. No state was changed.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// Duplicate name, archive month or badge.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    /// Failure outside the store, e.g. token signing.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = RatingError> = std::result::Result<T, E>;

impl RatingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RatingError::Validation(_) => StatusCode::BAD_REQUEST,
            RatingError::NotFound(_) => StatusCode::NOT_FOUND,
            RatingError::Conflict(_) => StatusCode::CONFLICT,
            RatingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RatingError::Storage(_) | RatingError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            RatingError::Storage(_) | RatingError::Internal(_) if crate::config::is_production() => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Map a unique-constraint violation to `Conflict`, pass everything else through.
pub fn conflict_on_unique(e: sqlx::Error, msg: &str) -> RatingError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RatingError::conflict(msg)
        }
        _ => RatingError::Storage(e),
    }
}

// Extractor rejections are bad input: same status and envelope as any
// other validation failure.
impl From<JsonRejection> for RatingError {
    fn from(rejection: JsonRejection) -> Self {
        RatingError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for RatingError {
    fn from(rejection: QueryRejection) -> Self {
        RatingError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for RatingError {
    fn from(rejection: PathRejection) -> Self {
        RatingError::Validation(rejection.body_text())
    }
}

impl IntoResponse for RatingError {
    fn into_response(self) -> Response {
        match &self {
            RatingError::Storage(e) => tracing::error!("Database error: {e}"),
            RatingError::Internal(e) => tracing::error!("Internal error: {e}"),
            _ => {}
        }
        (
            self.status(),
            Json(json!({ "success": false, "error": self.public_message() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RatingError::validation("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RatingError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(RatingError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            RatingError::Storage(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let e = RatingError::validation("points must be between 0 and 49");
        assert_eq!(e.public_message(), "points must be between 0 and 49");
    }

    // Only test touching the process-wide production flag.
    #[test]
    fn test_internal_errors_hidden_in_production() {
        let storage = RatingError::Storage(sqlx::Error::RowNotFound);
        let internal = RatingError::Internal("token signing failed".into());
        let client = RatingError::not_found("Archive not found");

        crate::config::set_production(false);
        assert!(!crate::config::is_production());
        assert_ne!(storage.public_message(), "Internal server error");
        assert_eq!(
            internal.public_message(),
            "internal error: token signing failed"
        );

        crate::config::set_production(true);
        assert!(crate::config::is_production());
        assert_eq!(storage.public_message(), "Internal server error");
        assert_eq!(internal.public_message(), "Internal server error");
        assert_eq!(client.public_message(), "Archive not found");

        crate::config::set_production(false);
    }

    #[test]
    fn test_non_unique_errors_stay_storage() {
        let e = conflict_on_unique(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(e, RatingError::Storage(_)));
    }
}
