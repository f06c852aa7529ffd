//! Pull-request/reviewer relation row.

use serde::Serialize;
use sqlx::FromRow;

/// One reviewer assigned to one pull request.
///
/// The pair is unique and `user_id` is never the pull request's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ReviewerAssignment {
    pub pr_id: String,
    pub user_id: String,
}
