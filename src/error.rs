use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::middleware::tenant::Deny;
use crate::store::StoreError;

/// Application error taxonomy. Every user-visible failure carries a stable
/// code plus a human message; dependency and database detail stays in the
/// operational log.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid credentials")]
    AuthenticationFailed,
    #[error("{0}")]
    AuthorizationDenied(Deny),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    ValidationFailed(String),
    #[error("{0}")]
    ConflictingState(String),
    #[error("{0}")]
    DependencyFailed(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationFailed => "authentication_failed",
            AppError::AuthorizationDenied(_) => "authorization_denied",
            AppError::NotFound(_) => "not_found",
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::ConflictingState(_) => "conflicting_state",
            AppError::DependencyFailed(_) => "dependency_failed",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConflictingState(_) => StatusCode::CONFLICT,
            AppError::DependencyFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Deny> for AppError {
    fn from(d: Deny) -> Self {
        AppError::AuthorizationDenied(d)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => AppError::ConflictingState(msg),
            StoreError::Other(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Never leak internals to the caller; the log keeps the detail.
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({ "error": message, "code": self.code() }));
        (self.status(), body).into_response()
    }
}
