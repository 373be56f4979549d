/**
 * Routes Module
 * API route handlers and the shared error / authorization plumbing
 */
pub mod auth;
pub mod forms;
pub mod health;
pub mod jobs;
pub mod media;
pub mod pages;
pub mod public;
pub mod settings;
pub mod sitemap;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::access::{self, Action, Resource};
use crate::error::StoreError;
use crate::state::AppState;
use auth::Claims;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success response (for delete)
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

fn error_body(status: StatusCode, error: &str, message: Option<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, &msg, None),
            ApiError::Unauthorized(msg) => error_body(StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Forbidden => error_body(
                StatusCode::FORBIDDEN,
                "Forbidden",
                Some("Your role does not allow this operation".to_string()),
            ),
            ApiError::NotFound => error_body(StatusCode::NOT_FOUND, "Not found", None),
            ApiError::Conflict(msg) => error_body(StatusCode::CONFLICT, &msg, None),
            ApiError::Store(e) => match e {
                StoreError::NotFound { .. } => error_body(StatusCode::NOT_FOUND, "Not found", None),
                StoreError::MissingField(field) => error_body(
                    StatusCode::BAD_REQUEST,
                    "Missing required field",
                    Some(field),
                ),
                StoreError::Invalid { field, reason } => error_body(
                    StatusCode::BAD_REQUEST,
                    "Invalid value",
                    Some(format!("{}: {}", field, reason)),
                ),
                e @ (StoreError::Io { .. } | StoreError::Serialization { .. }) => {
                    tracing::error!(error = %e, "content store failure");
                    error_body(StatusCode::INTERNAL_SERVER_ERROR, "Storage error", None)
                }
            },
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal error", None)
            }
        }
    }
}

/// Authenticate the bearer token and check the caller's role may perform
/// `action` on `resource`.
pub fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    resource: Resource,
    action: Action,
) -> Result<Claims, ApiError> {
    let token = auth::extract_bearer_token(headers)
        .ok_or(ApiError::Unauthorized("Authorization required"))?;
    let claims = auth::verify_access_token(&state.config.jwt_secret, &token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;

    if !access::is_allowed(claims.role, resource, action) {
        tracing::warn!(
            user = %claims.email,
            role = claims.role.as_str(),
            resource = resource.as_str(),
            action = ?action,
            "access denied"
        );
        return Err(ApiError::Forbidden);
    }
    Ok(claims)
}
