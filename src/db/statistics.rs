//! Review statistics queries.
//!
//! Each counter is its own query against the pool. No transaction spans
//! them, so writes landing in between may show up in some numbers and not
//! in others.

use super::pool::DbPool;
use crate::error::AppError;
use crate::models::{utc_from_unix, ReviewStatistics, ReviewerStatistics, TeamStatistics};

/// Compute pull request, reviewer and team counters.
pub async fn get_review_statistics(pool: &DbPool) -> Result<ReviewStatistics, AppError> {
    let (total_prs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pull_requests")
        .fetch_one(pool)
        .await?;

    let (open_prs,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pull_requests WHERE status = 'OPEN'")
            .fetch_one(pool)
            .await?;

    let (merged_prs,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pull_requests WHERE status = 'MERGED'")
            .fetch_one(pool)
            .await?;

    let reviewer_stats = get_reviewer_statistics(pool).await?;
    let team_stats = get_team_statistics(pool).await?;

    log::debug!(
        "[store] Statistics: {} total, {} open, {} merged",
        total_prs,
        open_prs,
        merged_prs
    );

    Ok(ReviewStatistics {
        total_prs,
        open_prs,
        merged_prs,
        reviewer_stats,
        team_stats,
        generated_at: chrono::Utc::now(),
    })
}

/// Assignment counts of every active user, busiest first.
async fn get_reviewer_statistics(pool: &DbPool) -> Result<Vec<ReviewerStatistics>, AppError> {
    let rows: Vec<(String, String, i64, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT
            u.id AS reviewer_id,
            u.username AS reviewer_name,
            COUNT(prr.pr_id) AS assigned_prs_count,
            MAX(pr.created_at) AS last_assigned_at
        FROM users u
        LEFT JOIN pull_request_reviewers prr ON u.id = prr.user_id
        LEFT JOIN pull_requests pr ON prr.pr_id = pr.id
        WHERE u.is_active = 1
        GROUP BY u.id, u.username
        ORDER BY assigned_prs_count DESC, u.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(
            |(reviewer_id, reviewer_name, assigned_prs_count, last_assigned_at)| {
                Ok(ReviewerStatistics {
                    reviewer_id,
                    reviewer_name,
                    assigned_prs_count,
                    last_assigned_at: last_assigned_at.map(utc_from_unix).transpose()?,
                })
            },
        )
        .collect()
}

/// Member and authorship counts per team.
///
/// Joining members to authored pull requests multiplies rows, so every
/// count is DISTINCT.
async fn get_team_statistics(pool: &DbPool) -> Result<Vec<TeamStatistics>, AppError> {
    let stats = sqlx::query_as::<_, TeamStatistics>(
        r#"
        SELECT
            t.name AS team_name,
            COUNT(DISTINCT u.id) AS member_count,
            COUNT(DISTINCT CASE WHEN u.is_active = 1 THEN u.id END) AS active_member_count,
            COUNT(DISTINCT pr.id) AS prs_created
        FROM teams t
        LEFT JOIN users u ON u.team_name = t.name
        LEFT JOIN pull_requests pr ON pr.author_id = u.id
        GROUP BY t.name
        ORDER BY t.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(stats)
}
