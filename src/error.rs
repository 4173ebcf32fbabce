//! Unified error taxonomy for the chat fan-out core (spec.md §7).
//!
//! Every fallible Dispatcher/Store/API path resolves to one of these kinds,
//! each with a stable `error_code()` for metrics labeling and a documented
//! HTTP status via `IntoResponse`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// The `Forbidden` discriminator (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    NotAMember,
    Blocked,
    BlockedByRecipient,
    SelfSend,
}

impl ForbiddenKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::NotAMember => "NotAMember",
            Self::Blocked => "Blocked",
            Self::BlockedByRecipient => "BlockedByRecipient",
            Self::SelfSend => "SelfSend",
        }
    }
}

/// Top-level error kind returned by Dispatcher/Store operations and turned
/// into an HTTP response at the API boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0:?}")]
    Forbidden(ForbiddenKind),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("store unavailable")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("bus unavailable")]
    BusUnavailable(String),

    #[error("pubsub unavailable")]
    PubSubUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable code for metrics labeling and for the JSON body's `error` field.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(kind) => kind.as_str(),
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::BusUnavailable(_) => "bus_unavailable",
            Self::PubSubUnavailable(_) => "pubsub_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) | Self::BusUnavailable(_) | Self::PubSubUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, code = self.error_code(), "internal error");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request failed");
        }
        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.error_code()])
            .inc();
        let body = ErrorBody {
            error: self.error_code(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(err)
    }
}

impl From<crate::store::DbError> for ApiError {
    fn from(err: crate::store::DbError) -> Self {
        match err {
            crate::store::DbError::Sqlx(e) => Self::StoreUnavailable(e),
            crate::store::DbError::Migration(e) => Self::Internal(e.to_string()),
            crate::store::DbError::NotFound(msg) => Self::NotFound(msg),
            crate::store::DbError::AlreadyExists(msg) => Self::Conflict(msg),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ApiError::Unauthenticated.error_code(), "unauthenticated");
        assert_eq!(
            ApiError::Forbidden(ForbiddenKind::Blocked).error_code(),
            "Blocked"
        );
        assert_eq!(
            ApiError::Forbidden(ForbiddenKind::NotAMember).error_code(),
            "NotAMember"
        );
    }

    #[test]
    fn status_codes_match_spec() {
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Forbidden(ForbiddenKind::SelfSend).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("chat".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("phone".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
