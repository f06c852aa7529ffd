//! Review statistics models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Point-in-time review and team counters.
///
/// Built from independent queries, so under concurrent writes the numbers
/// may not describe one single instant.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewStatistics {
    pub total_prs: i64,
    pub open_prs: i64,
    pub merged_prs: i64,
    pub reviewer_stats: Vec<ReviewerStatistics>,
    pub team_stats: Vec<TeamStatistics>,
    pub generated_at: DateTime<Utc>,
}

/// Assignment load of one active user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerStatistics {
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub assigned_prs_count: i64,
    /// Creation time of the newest pull request the user reviews.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_assigned_at: Option<DateTime<Utc>>,
}

/// Membership and authorship counters of one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TeamStatistics {
    pub team_name: String,
    pub member_count: i64,
    pub active_member_count: i64,
    pub prs_created: i64,
}
