use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::{auth::Role, query::QueryError, repository::RepoError};

pub type ApiResult<T> = Result<T, ApiError>;

/// ApiError
///
/// The single error type surfaced by handlers and interceptors. Every variant renders as
/// `{ "success": false, "error": "<message>" }` with the status listed below.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401: no credential, bad signature, expired token or unknown user.
    #[error("Not authorized to access this route")]
    Unauthorized,

    /// 403: authenticated, but the role is outside the route's allowed set.
    #[error("User role {role} is not authorized to access this route")]
    Forbidden { role: Role },

    /// 401: authenticated and role-permitted, but not the owner of the target record.
    #[error("User {user} is not authorized to {action} {target}")]
    NotOwner {
        user: Uuid,
        action: &'static str,
        target: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Repository(#[from] RepoError),

    /// 500: the route was wired without something its handler relies on.
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    /// Malformed identifiers are reported the same way as missing records.
    pub fn resource_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Resource not found with id of {id}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::NotOwner { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Query(_) => StatusCode::BAD_REQUEST,
            ApiError::Repository(RepoError::Duplicate(_)) => StatusCode::BAD_REQUEST,
            ApiError::Repository(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ApiError::Repository(RepoError::Duplicate(_)) => {
                "Duplicate field value entered".to_string()
            }
            ApiError::Repository(e) => {
                // Internal detail goes to the log, never to the client.
                tracing::error!(error = ?e, "repository failure");
                "Server Error".to_string()
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "internal error");
                "Server Error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "success": false,
                "error": message,
            })),
        )
            .into_response()
    }
}
