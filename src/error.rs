//! Application error types.
//!
//! Every operation of the assignment engine, the team directory and the
//! entity store reports failures through [`AppError`]. The variants are
//! serializable so the request boundary can hand them to callers as
//! structured results.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors surfaced to the request boundary.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Referenced user, team or pull request does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// The author exists but is deactivated.
    #[error("Author {user_id} is not active")]
    InactiveAuthor { user_id: String },

    /// Operation not permitted in the current lifecycle state.
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Reviewer is not currently assigned to the pull request.
    #[error("Reviewer {reviewer_id} is not assigned to pull request {pull_request_id}")]
    NotAssigned {
        pull_request_id: String,
        reviewer_id: String,
    },

    /// Reassignment found no eligible replacement.
    #[error("No available reviewer for pull request {pull_request_id}")]
    NoAvailableReviewer {
        pull_request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        team_name: Option<String>,
    },

    /// Uniqueness violation, e.g. a duplicate pull request id.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The store could not be reached or the pool is exhausted.
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// The caller's deadline elapsed before the operation finished.
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create an inactive author error.
    pub fn inactive_author(user_id: impl Into<String>) -> Self {
        Self::InactiveAuthor {
            user_id: user_id.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a not assigned error.
    pub fn not_assigned(pull_request_id: impl Into<String>, reviewer_id: impl Into<String>) -> Self {
        Self::NotAssigned {
            pull_request_id: pull_request_id.into(),
            reviewer_id: reviewer_id.into(),
        }
    }

    /// Create a no available reviewer error.
    pub fn no_available_reviewer(
        pull_request_id: impl Into<String>,
        team_name: Option<String>,
    ) -> Self {
        Self::NoAvailableReviewer {
            pull_request_id: pull_request_id.into(),
            team_name,
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a store unavailable error.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Reject empty or whitespace-only required values.
pub fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            format!("{} is required", field),
            field,
        ));
    }
    Ok(())
}

/// Whether a sqlx error is a uniqueness violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Whether a sqlx error is a foreign key violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::conflict(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut => {
                Self::store_unavailable("timed out waiting for a database connection")
            }
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
                Self::store_unavailable(err.to_string())
            }
            _ => Self::database(err.to_string()),
        }
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        match err {
            crate::db::DbError::Sqlite(e) => Self::from(e),
            other => Self::database(other.to_string()),
        }
    }
}
