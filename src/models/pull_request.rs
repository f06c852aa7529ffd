//! Pull request model.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle status of a pull request.
///
/// `Merged` is terminal: no reviewer changes are accepted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl TryFrom<&str> for PullRequestStatus {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(AppError::internal(format!(
                "unknown pull request status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request with its assigned reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,

    #[serde(rename = "pull_request_name")]
    pub title: String,

    pub author_id: String,

    pub status: PullRequestStatus,

    /// Reviewer user ids, sorted. Never contains `author_id`.
    pub assigned_reviewers: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// Set exactly when `status` is `MERGED`.
    pub merged_at: Option<DateTime<Utc>>,
}

/// Row shape of the `pull_requests` table.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct PullRequestRow {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub status: String,
    pub created_at: i64,
    pub merged_at: Option<i64>,
}

impl PullRequestRow {
    pub(crate) fn into_pull_request(
        self,
        assigned_reviewers: Vec<String>,
    ) -> Result<PullRequest, AppError> {
        Ok(PullRequest {
            status: PullRequestStatus::try_from(self.status.as_str())?,
            id: self.id,
            title: self.title,
            author_id: self.author_id,
            assigned_reviewers,
            created_at: super::utc_from_unix(self.created_at)?,
            merged_at: self.merged_at.map(super::utc_from_unix).transpose()?,
        })
    }
}

/// Pull request summary used in reviewer listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestShort {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub title: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// Input for creating a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPullRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub title: String,
    pub author_id: String,
}
