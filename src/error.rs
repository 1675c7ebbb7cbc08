//! Error types for tollgate
//!
//! This module defines the error hierarchy used throughout the application.
//! We use `thiserror` for library-style errors that are part of the API,
//! and convert to HTTP responses at the boundary (see [`http_mapper`]).

pub mod http_mapper;

use std::fmt;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid permission pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Persistence errors raised by an [`AccessStore`](crate::store::AccessStore)
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DbError::NotFound(error.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Unavailable(error.to_string())
            }
            _ => DbError::Internal(error.to_string()),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Errors raised by role and permission management operations
#[derive(Error, Debug)]
pub enum AccessError {
    /// Input rejected before touching the store
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Role or permission id could not be resolved
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Duplicate slug, unknown permission ids, or a no-op assignment
    #[error("{message}")]
    Conflict { message: String, invalid_ids: Vec<i64> },

    #[error("Storage error: {0}")]
    Store(DbError),
}

impl AccessError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn role_not_found(id: i64) -> Self {
        Self::NotFound { entity: "Role", id }
    }

    pub fn permission_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Permission",
            id,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            invalid_ids: Vec::new(),
        }
    }

    /// Create an error listing permission ids that do not exist
    pub fn invalid_permission_ids(invalid_ids: Vec<i64>) -> Self {
        let listed = invalid_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self::Conflict {
            message: format!("Some permission IDs are invalid: [{}]", listed),
            invalid_ids,
        }
    }
}

impl From<DbError> for AccessError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Conflict(message) => AccessError::conflict(message),
            other => AccessError::Store(other),
        }
    }
}

/// Stage of the permission sync pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Reconciling,
    AutoAssigning,
}

impl SyncStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Reconciling => "reconciling",
            SyncStage::AutoAssigning => "auto_assigning",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Permission sync failures
#[derive(Error, Debug)]
pub enum SyncError {
    /// A pipeline stage failed; partial results already persisted stay in place
    #[error("Permission sync failed while {stage}: {source}")]
    Stage {
        stage: SyncStage,
        #[source]
        source: DbError,
    },

    #[error("A permission sync is already in progress")]
    AlreadyRunning,
}

impl SyncError {
    pub fn reconciling(source: DbError) -> Self {
        Self::Stage {
            stage: SyncStage::Reconciling,
            source,
        }
    }

    pub fn auto_assigning(source: DbError) -> Self {
        Self::Stage {
            stage: SyncStage::AutoAssigning,
            source,
        }
    }

    /// The stage that failed, if any
    pub fn stage(&self) -> Option<SyncStage> {
        match self {
            SyncError::Stage { stage, .. } => Some(*stage),
            SyncError::AlreadyRunning => None,
        }
    }
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or unknown token")]
    InvalidToken,

    #[error("Failed to resolve principal: {0}")]
    Store(#[from] DbError),
}

/// Result type alias for role and permission management
pub type AccessResult<T> = std::result::Result<T, AccessError>;
