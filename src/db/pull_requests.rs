//! Pull request queries and the transactional operations behind the
//! assignment engine.
//!
//! Multi-statement operations run inside a `sqlx::Transaction`. Returning
//! early (an error, or the caller dropping the future) drops the transaction,
//! which rolls it back; only an explicit `commit` makes changes visible.

use super::pool::DbPool;
use crate::error::{is_foreign_key_violation, is_unique_violation, AppError};
use crate::models::pull_request::PullRequestRow;
use crate::models::{
    NewPullRequest, PullRequest, PullRequestShort, PullRequestStatus, ReviewerAssignment,
};
use sqlx::SqliteExecutor;

/// Outcome of a merge request against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The pull request went from OPEN to MERGED.
    Merged,
    /// The pull request was already merged; nothing changed.
    AlreadyMerged,
}

/// Insert a pull request and its reviewer rows atomically.
///
/// Either the pull request and every reviewer row exist afterwards, or none
/// of them do.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `pr` - Pull request id, title and author
/// * `reviewer_ids` - Reviewers to assign; must not contain the author
///
/// # Returns
/// The created pull request, status OPEN
pub async fn create_pull_request(
    pool: &DbPool,
    pr: &NewPullRequest,
    reviewer_ids: &[String],
) -> Result<PullRequest, AppError> {
    if reviewer_ids.iter().any(|r| r == &pr.author_id) {
        return Err(AppError::invalid_input_field(
            "author cannot review their own pull request",
            "reviewers",
        ));
    }

    log::debug!(
        "[store] Creating pull request {} by {} with reviewers {:?}",
        pr.id,
        pr.author_id,
        reviewer_ids
    );

    let created_at = super::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO pull_requests (id, title, author_id, status, created_at)
        VALUES (?, ?, ?, 'OPEN', ?)
        "#,
    )
    .bind(&pr.id)
    .bind(&pr.title)
    .bind(&pr.author_id)
    .bind(created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(format!("pull request {} already exists", pr.id))
        } else if is_foreign_key_violation(&e) {
            AppError::not_found_with_id("User", pr.author_id.clone())
        } else {
            AppError::from(e)
        }
    })?;

    for reviewer_id in reviewer_ids {
        sqlx::query("INSERT INTO pull_request_reviewers (pr_id, user_id) VALUES (?, ?)")
            .bind(&pr.id)
            .bind(reviewer_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                log::error!(
                    "[store] Failed to insert reviewer {} for {}: {}",
                    reviewer_id,
                    pr.id,
                    e
                );
                if is_unique_violation(&e) {
                    AppError::conflict(format!(
                        "reviewer {} is already assigned to pull request {}",
                        reviewer_id, pr.id
                    ))
                } else if is_foreign_key_violation(&e) {
                    AppError::not_found_with_id("User", reviewer_id.clone())
                } else {
                    AppError::from(e)
                }
            })?;
    }

    tx.commit().await?;

    let mut assigned_reviewers = reviewer_ids.to_vec();
    assigned_reviewers.sort();

    log::info!("[store] Created pull request {}", pr.id);

    Ok(PullRequest {
        id: pr.id.clone(),
        title: pr.title.clone(),
        author_id: pr.author_id.clone(),
        status: PullRequestStatus::Open,
        assigned_reviewers,
        created_at: crate::models::utc_from_unix(created_at)?,
        merged_at: None,
    })
}

/// Get a pull request with its reviewers.
///
/// Both reads run in one transaction so the reviewer list matches the row.
///
/// # Returns
/// `None` if no pull request has this id.
pub async fn get_pull_request(pool: &DbPool, id: &str) -> Result<Option<PullRequest>, AppError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, PullRequestRow>(
        r#"
        SELECT id, title, author_id, status, created_at, merged_at
        FROM pull_requests
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let reviewers = list_reviewer_assignments(&mut *tx, id)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();

    tx.commit().await?;

    row.into_pull_request(reviewers).map(Some)
}

/// Reviewer rows of one pull request, ordered by reviewer id.
pub async fn list_reviewer_assignments<'e>(
    executor: impl SqliteExecutor<'e>,
    pr_id: &str,
) -> Result<Vec<ReviewerAssignment>, AppError> {
    let assignments = sqlx::query_as::<_, ReviewerAssignment>(
        r#"
        SELECT pr_id, user_id
        FROM pull_request_reviewers
        WHERE pr_id = ?
        ORDER BY user_id
        "#,
    )
    .bind(pr_id)
    .fetch_all(executor)
    .await?;

    Ok(assignments)
}

/// Pull requests the user is currently assigned to review, newest first.
pub async fn get_pull_requests_by_reviewer(
    pool: &DbPool,
    reviewer_id: &str,
) -> Result<Vec<PullRequestShort>, AppError> {
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        r#"
        SELECT pr.id, pr.title, pr.author_id, pr.status
        FROM pull_requests pr
        INNER JOIN pull_request_reviewers prr ON pr.id = prr.pr_id
        WHERE prr.user_id = ?
        ORDER BY pr.created_at DESC, pr.id
        "#,
    )
    .bind(reviewer_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, title, author_id, status)| {
            Ok(PullRequestShort {
                status: PullRequestStatus::try_from(status.as_str())?,
                id,
                title,
                author_id,
            })
        })
        .collect()
}

/// Move a pull request to MERGED and stamp `merged_at`.
///
/// Idempotent: an already merged pull request is left untouched, keeping the
/// timestamp of the first merge.
///
/// The transition and the read of the resulting pull request share one
/// transaction, so the returned value is exactly what was committed.
///
/// # Returns
/// Whether this call performed the transition, and the pull request as
/// stored. Fails with `NotFound` if the pull request does not exist.
pub async fn merge_pull_request(
    pool: &DbPool,
    id: &str,
) -> Result<(MergeOutcome, PullRequest), AppError> {
    let mut tx = pool.begin().await?;

    let merged = sqlx::query_as::<_, PullRequestRow>(
        r#"
        UPDATE pull_requests
        SET status = 'MERGED', merged_at = ?
        WHERE id = ? AND status = 'OPEN'
        RETURNING id, title, author_id, status, created_at, merged_at
        "#,
    )
    .bind(super::now())
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let (outcome, row) = match merged {
        Some(row) => (MergeOutcome::Merged, row),
        None => {
            let existing = sqlx::query_as::<_, PullRequestRow>(
                r#"
                SELECT id, title, author_id, status, created_at, merged_at
                FROM pull_requests
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = existing else {
                log::warn!("[store] Pull request {} not found for merge", id);
                return Err(AppError::not_found_with_id("PullRequest", id));
            };
            (MergeOutcome::AlreadyMerged, row)
        }
    };

    let reviewers = list_reviewer_assignments(&mut *tx, id)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();

    tx.commit().await?;

    match outcome {
        MergeOutcome::Merged => log::info!("[store] Merged pull request {}", id),
        MergeOutcome::AlreadyMerged => log::info!("[store] Pull request {} already merged", id),
    }

    Ok((outcome, row.into_pull_request(reviewers)?))
}

/// Replace one reviewer of an open pull request with a random eligible
/// teammate.
///
/// Runs as one transaction. Checks, in order:
/// 1. the pull request exists (`NotFound`)
/// 2. it is not merged (`InvalidState`)
/// 3. `old_reviewer_id` is assigned to it (`NotAssigned`)
/// 4. an active member of the outgoing reviewer's team exists who is neither
///    the outgoing reviewer, the author, nor already assigned
///    (`NoAvailableReviewer`)
///
/// Eligibility filtering and the random pick happen in one query, inside the
/// same transaction as the update.
///
/// # Returns
/// The id of the new reviewer
pub async fn reassign_reviewer(
    pool: &DbPool,
    pr_id: &str,
    old_reviewer_id: &str,
) -> Result<String, AppError> {
    let mut tx = pool.begin().await?;

    // No-op write: takes the database write lock before anything is read,
    // so concurrent reassignments queue here instead of racing on a snapshot.
    let pr: Option<(String, String)> = sqlx::query_as(
        r#"
        UPDATE pull_requests SET status = status
        WHERE id = ?
        RETURNING status, author_id
        "#,
    )
    .bind(pr_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((status, author_id)) = pr else {
        log::warn!("[store] Pull request {} not found for reassignment", pr_id);
        return Err(AppError::not_found_with_id("PullRequest", pr_id));
    };

    if PullRequestStatus::try_from(status.as_str())? == PullRequestStatus::Merged {
        log::warn!("[store] Cannot reassign reviewers on merged pull request {}", pr_id);
        return Err(AppError::invalid_state(
            "cannot reassign on a merged pull request",
        ));
    }

    let assigned = sqlx::query("SELECT 1 FROM pull_request_reviewers WHERE pr_id = ? AND user_id = ?")
        .bind(pr_id)
        .bind(old_reviewer_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

    if !assigned {
        return Err(AppError::not_assigned(pr_id, old_reviewer_id));
    }

    let team_name: Option<String> =
        sqlx::query_scalar::<_, Option<String>>("SELECT team_name FROM users WHERE id = ?")
            .bind(old_reviewer_id)
            .fetch_optional(&mut *tx)
            .await?
            .flatten();

    let Some(team_name) = team_name else {
        return Err(AppError::no_available_reviewer(pr_id, None));
    };

    let new_reviewer_id: Option<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM users
        WHERE team_name = ?
          AND is_active = 1
          AND id != ?
          AND id != ?
          AND id NOT IN (
              SELECT user_id FROM pull_request_reviewers WHERE pr_id = ?
          )
        ORDER BY RANDOM()
        LIMIT 1
        "#,
    )
    .bind(&team_name)
    .bind(old_reviewer_id)
    .bind(&author_id)
    .bind(pr_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(new_reviewer_id) = new_reviewer_id else {
        log::warn!(
            "[store] No available reviewers in team {} for pull request {}",
            team_name,
            pr_id
        );
        return Err(AppError::no_available_reviewer(pr_id, Some(team_name)));
    };

    sqlx::query("UPDATE pull_request_reviewers SET user_id = ? WHERE pr_id = ? AND user_id = ?")
        .bind(&new_reviewer_id)
        .bind(pr_id)
        .bind(old_reviewer_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!(
        "[store] Reassigned pull request {} from {} to {}",
        pr_id,
        old_reviewer_id,
        new_reviewer_id
    );

    Ok(new_reviewer_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::PoolSettings;
    use tempfile::tempdir;

    async fn setup_test_db() -> DbPool {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::mem::forget(dir);

        let pool = crate::db::initialize(&db_path, PoolSettings::default())
            .await
            .unwrap();

        sqlx::query("INSERT INTO teams (name) VALUES ('team1')")
            .execute(&pool)
            .await
            .unwrap();

        for id in ["author1", "reviewer1", "reviewer2"] {
            sqlx::query("INSERT INTO users (id, username, is_active, team_name) VALUES (?, ?, 1, 'team1')")
                .bind(id)
                .bind(id)
                .execute(&pool)
                .await
                .unwrap();
        }

        pool
    }

    fn new_pr(id: &str) -> NewPullRequest {
        NewPullRequest {
            id: id.to_string(),
            title: "Test PR".to_string(),
            author_id: "author1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = setup_test_db().await;

        let reviewers = vec!["reviewer2".to_string(), "reviewer1".to_string()];
        let created = create_pull_request(&pool, &new_pr("pr1"), &reviewers)
            .await
            .unwrap();
        assert_eq!(created.status, PullRequestStatus::Open);
        assert_eq!(created.assigned_reviewers, vec!["reviewer1", "reviewer2"]);

        let fetched = get_pull_request(&pool, "pr1").await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_rejects_author_as_reviewer() {
        let pool = setup_test_db().await;

        let err = create_pull_request(&pool, &new_pr("pr1"), &["author1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
        assert!(get_pull_request(&pool, "pr1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_pr_id_is_conflict() {
        let pool = setup_test_db().await;

        create_pull_request(&pool, &new_pr("pr1"), &[]).await.unwrap();
        let err = create_pull_request(&pool, &new_pr("pr1"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let pool = setup_test_db().await;
        create_pull_request(&pool, &new_pr("pr1"), &["reviewer1".to_string()])
            .await
            .unwrap();

        let (outcome, merged) = merge_pull_request(&pool, "pr1").await.unwrap();
        assert_eq!(outcome, MergeOutcome::Merged);
        assert_eq!(merged.status, PullRequestStatus::Merged);
        assert_eq!(merged.assigned_reviewers, vec!["reviewer1"]);
        assert!(merged.merged_at.is_some());

        // The returned pull request is the committed one
        let stored = get_pull_request(&pool, "pr1").await.unwrap().unwrap();
        assert_eq!(stored, merged);

        let (outcome, again) = merge_pull_request(&pool, "pr1").await.unwrap();
        assert_eq!(outcome, MergeOutcome::AlreadyMerged);
        assert_eq!(again, merged);

        let err = merge_pull_request(&pool, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reassign_picks_remaining_teammate() {
        let pool = setup_test_db().await;
        create_pull_request(&pool, &new_pr("pr1"), &["reviewer1".to_string()])
            .await
            .unwrap();

        let new_id = reassign_reviewer(&pool, "pr1", "reviewer1").await.unwrap();
        assert_eq!(new_id, "reviewer2");

        let pr = get_pull_request(&pool, "pr1").await.unwrap().unwrap();
        assert_eq!(pr.assigned_reviewers, vec!["reviewer2"]);
    }

    #[tokio::test]
    async fn test_reassign_never_picks_author() {
        let pool = setup_test_db().await;
        create_pull_request(
            &pool,
            &new_pr("pr1"),
            &["reviewer1".to_string(), "reviewer2".to_string()],
        )
        .await
        .unwrap();

        // author1 shares the team and is unassigned, but must not be picked
        let err = reassign_reviewer(&pool, "pr1", "reviewer1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoAvailableReviewer { .. }));
    }

    #[tokio::test]
    async fn test_reviewer_listing() {
        let pool = setup_test_db().await;
        create_pull_request(&pool, &new_pr("pr1"), &["reviewer1".to_string()])
            .await
            .unwrap();
        create_pull_request(&pool, &new_pr("pr2"), &["reviewer2".to_string()])
            .await
            .unwrap();

        let prs = get_pull_requests_by_reviewer(&pool, "reviewer1").await.unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].id, "pr1");

        assert!(get_pull_requests_by_reviewer(&pool, "author1")
            .await
            .unwrap()
            .is_empty());
    }
}
