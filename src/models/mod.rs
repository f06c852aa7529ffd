//! Data models for the application.
//!
//! These models represent the entities stored in the SQLite database and
//! returned across the request boundary.
//!
//! Models derive Serialize for JSON responses and, where they map to a single
//! table row, FromRow for SQLx queries.

pub mod pull_request;
pub mod reviewer_assignment;
pub mod statistics;
pub mod team;
pub mod user;

use crate::error::AppError;
use chrono::{DateTime, Utc};

// Re-exports for convenient access
pub use pull_request::{NewPullRequest, PullRequest, PullRequestShort, PullRequestStatus};
pub use reviewer_assignment::ReviewerAssignment;
pub use statistics::{ReviewStatistics, ReviewerStatistics, TeamStatistics};
pub use team::{NewTeam, Team, TeamMember};
pub use user::{NewUser, User};

/// Convert a stored Unix timestamp (seconds) to UTC.
pub(crate) fn utc_from_unix(secs: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::internal(format!("timestamp out of range: {}", secs)))
}
