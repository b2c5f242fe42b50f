use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde_json::json;

use crate::conflict::ConflictCheck;

/// Error taxonomy shared by every handler. Each variant maps to exactly one
/// HTTP status; upstream details are logged but never leaked to clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    /// Token verification itself threw (malformed token, bad signature).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    /// Optimistic-lock violation. Carries the full check result so the
    /// client can re-sync from `currentUpdatedAt`.
    #[error("conflict")]
    Conflict(ConflictCheck),

    #[error("upstream error: {0}")]
    Upstream(#[from] sqlx::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Conflict(check) => HttpResponse::Conflict().json(check),
            ApiError::Upstream(err) => {
                error!("upstream failure: {}", err);
                HttpResponse::InternalServerError().json(json!({ "error": "internal error" }))
            }
            other => HttpResponse::build(other.status_code())
                .json(json!({ "error": other.to_string() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictReason;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::AuthenticationFailed("bad".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        let conflict = ApiError::Conflict(ConflictCheck {
            conflict: true,
            reason: Some(ConflictReason::Outdated),
            current_updated_at: Some(1100),
        });
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
    }
}
