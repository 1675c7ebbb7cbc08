//! HTTP error mapping.
//!
//! Maps application errors to HTTP status codes and JSON bodies for the admin API.
//!
//! # Strategy
//! - Validation errors → `400 Bad Request`
//! - Missing/unknown credentials → `401 Unauthorized`
//! - Authorization denials → `403 Forbidden` naming the unmet dimension
//! - Unresolvable ids → `404 Not Found`
//! - Duplicate slugs, invalid permission ids, concurrent sync → `409 Conflict`
//! - Storage and sync failures → `500 Internal Server Error` naming the sync stage

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::error;

use super::{AccessError, AuthError, DbError, SyncError};
use crate::access_control::DenyReason;

/// An error ready to be rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

/// Result type alias for admin API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(error: AccessError) -> Self {
        map_access_error(&error)
    }
}

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        map_sync_error(&error)
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        map_auth_error(&error)
    }
}

/// Maps an `AccessError` to an HTTP error.
pub fn map_access_error(error: &AccessError) -> ApiError {
    match error {
        AccessError::Validation(message) => ApiError {
            status: StatusCode::BAD_REQUEST,
            body: json!({
                "error": "ValidationError",
                "message": message
            }),
        },

        AccessError::NotFound { entity, id } => ApiError {
            status: StatusCode::NOT_FOUND,
            body: json!({
                "error": "NotFound",
                "message": error.to_string(),
                "entity": entity,
                "id": id
            }),
        },

        AccessError::Conflict {
            message,
            invalid_ids,
        } => ApiError {
            status: StatusCode::CONFLICT,
            body: json!({
                "error": "Conflict",
                "message": message,
                "invalid_ids": invalid_ids
            }),
        },

        AccessError::Store(db_err) => map_db_error(db_err),
    }
}

/// Maps a `DbError` to an HTTP error.
///
/// Only infrastructure failures reach this point; the details go to the log,
/// not to the client.
pub fn map_db_error(error: &DbError) -> ApiError {
    match error {
        DbError::NotFound(message) => ApiError {
            status: StatusCode::NOT_FOUND,
            body: json!({
                "error": "NotFound",
                "message": message
            }),
        },
        DbError::Conflict(message) => ApiError {
            status: StatusCode::CONFLICT,
            body: json!({
                "error": "Conflict",
                "message": message,
                "invalid_ids": []
            }),
        },
        DbError::Unavailable(_) | DbError::Migration(_) | DbError::Internal(_) => {
            error!(error = %error, "Storage failure while handling request");
            internal_error("Unexpected error, check server log.")
        }
    }
}

/// Maps a `SyncError` to an HTTP error.
pub fn map_sync_error(error: &SyncError) -> ApiError {
    match error {
        SyncError::AlreadyRunning => ApiError {
            status: StatusCode::CONFLICT,
            body: json!({
                "error": "SyncInProgress",
                "message": error.to_string()
            }),
        },
        SyncError::Stage { stage, source } => {
            error!(stage = %stage, error = %source, "Permission sync failed");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: json!({
                    "error": "SyncFailed",
                    "message": error.to_string(),
                    "stage": stage.as_str()
                }),
            }
        }
    }
}

/// Maps an `AuthError` to an HTTP error.
pub fn map_auth_error(error: &AuthError) -> ApiError {
    match error {
        AuthError::MissingToken | AuthError::InvalidToken => ApiError {
            status: StatusCode::UNAUTHORIZED,
            body: json!({
                "error": "Unauthorized",
                "message": error.to_string()
            }),
        },
        AuthError::Store(db_err) => map_db_error(db_err),
    }
}

/// Creates a `403 Forbidden` error for a denied authorization check.
pub fn forbidden(reason: &DenyReason) -> ApiError {
    ApiError {
        status: StatusCode::FORBIDDEN,
        body: json!({
            "error": "Forbidden",
            "reason": reason.to_string(),
            "dimension": reason.dimension(),
            "required": reason.required()
        }),
    }
}

/// Creates an error for an internal server error.
pub fn internal_error(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({
            "error": "InternalError",
            "message": message.into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncStage;

    #[test]
    fn test_map_validation() {
        let err = map_access_error(&AccessError::validation("slug too short"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body["error"], "ValidationError");
    }

    #[test]
    fn test_map_not_found() {
        let err = map_access_error(&AccessError::role_not_found(12));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body["id"], 12);
        assert_eq!(err.body["entity"], "Role");
    }

    #[test]
    fn test_map_conflict_lists_ids() {
        let err = map_access_error(&AccessError::invalid_permission_ids(vec![3, 4]));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body["invalid_ids"], json!([3, 4]));
    }

    #[test]
    fn test_map_sync_errors() {
        let err = map_sync_error(&SyncError::AlreadyRunning);
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err = map_sync_error(&SyncError::Stage {
            stage: SyncStage::Reconciling,
            source: DbError::Unavailable("connection refused".into()),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body["stage"], "reconciling");
    }

    #[test]
    fn test_map_auth_errors() {
        assert_eq!(
            map_auth_error(&AuthError::MissingToken).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            map_auth_error(&AuthError::InvalidToken).status,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_forbidden_names_dimension() {
        let err = forbidden(&DenyReason::MissingRole {
            required: vec!["admin".into()],
        });
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.body["dimension"], "role");
        assert_eq!(err.body["required"], json!(["admin"]));
    }
}
