//! Pull request assignment engine.
//!
//! The engine owns no state besides the pool handle. Every decision is made
//! from a fresh read; the writes behind create, merge and reassign are each
//! a single store transaction (see `db::pull_requests`).
//!
//! Dropping an engine future mid-flight drops the open transaction with it,
//! which rolls back. [`with_deadline`] relies on that to bound an operation
//! in time without leaving partial writes behind.

use crate::db::pool::DbPool;
use crate::db::pull_requests::{self, MergeOutcome};
use crate::db::{statistics, users};
use crate::error::{require_non_empty, AppError};
use crate::models::{NewPullRequest, PullRequest, PullRequestShort, ReviewStatistics};
use crate::services::reviewer_selector::{select_reviewers, MAX_REVIEWERS};
use std::future::Future;
use std::time::Duration;

/// Creates, merges and reassigns pull requests against the entity store.
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    pool: DbPool,
}

impl AssignmentEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create an OPEN pull request and assign up to two reviewers from the
    /// author's team.
    ///
    /// Candidates are the author's active teammates. An author without a
    /// team, or alone in it, gets a pull request with no reviewers.
    ///
    /// # Errors
    /// * `InvalidInput` - an argument is empty
    /// * `NotFound` - the author does not exist
    /// * `InactiveAuthor` - the author is deactivated
    /// * `Conflict` - a pull request with this id already exists
    pub async fn create_pull_request(
        &self,
        id: &str,
        title: &str,
        author_id: &str,
    ) -> Result<PullRequest, AppError> {
        require_non_empty(id, "pull_request_id")?;
        require_non_empty(title, "pull_request_name")?;
        require_non_empty(author_id, "author_id")?;

        log::info!("[assignment] Creating pull request {} by {}", id, author_id);

        let author = users::get_user(&self.pool, author_id)
            .await?
            .ok_or_else(|| {
                log::warn!("[assignment] Author {} not found", author_id);
                AppError::not_found_with_id("User", author_id)
            })?;

        if !author.is_active {
            log::warn!("[assignment] Author {} is not active", author_id);
            return Err(AppError::inactive_author(author_id));
        }

        let candidates = match &author.team_name {
            Some(team_name) => {
                users::get_active_team_members(&self.pool, team_name, &author.id).await?
            }
            None => Vec::new(),
        };

        let reviewers = select_reviewers(&candidates, MAX_REVIEWERS, &mut rand::thread_rng());

        let pr = pull_requests::create_pull_request(
            &self.pool,
            &NewPullRequest {
                id: id.to_string(),
                title: title.to_string(),
                author_id: author.id.clone(),
            },
            &reviewers,
        )
        .await?;

        log::info!(
            "[assignment] Created pull request {} with {} reviewer(s) out of {} candidate(s)",
            pr.id,
            pr.assigned_reviewers.len(),
            candidates.len()
        );

        Ok(pr)
    }

    /// Mark a pull request as merged.
    ///
    /// Merging an already merged pull request succeeds and changes nothing;
    /// `merged_at` keeps the value from the first merge.
    ///
    /// # Returns
    /// The pull request as committed by the merge.
    pub async fn merge_pull_request(&self, id: &str) -> Result<PullRequest, AppError> {
        require_non_empty(id, "pull_request_id")?;

        let (outcome, pr) = pull_requests::merge_pull_request(&self.pool, id).await?;
        match outcome {
            MergeOutcome::Merged => log::info!("[assignment] Merged pull request {}", id),
            MergeOutcome::AlreadyMerged => {
                log::debug!("[assignment] Pull request {} was already merged", id)
            }
        }

        Ok(pr)
    }

    /// Replace `old_reviewer_id` on an open pull request with a random active
    /// member of the outgoing reviewer's team.
    ///
    /// # Errors
    /// * `NotFound` - the pull request does not exist
    /// * `InvalidState` - the pull request is merged
    /// * `NotAssigned` - `old_reviewer_id` is not a reviewer of it
    /// * `NoAvailableReviewer` - nobody eligible is left in the team
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<(), AppError> {
        require_non_empty(pr_id, "pull_request_id")?;
        require_non_empty(old_reviewer_id, "old_user_id")?;

        log::info!(
            "[assignment] Reassigning reviewer {} on pull request {}",
            old_reviewer_id,
            pr_id
        );

        let new_reviewer_id =
            pull_requests::reassign_reviewer(&self.pool, pr_id, old_reviewer_id).await?;

        log::info!(
            "[assignment] Reviewer {} replaced by {} on pull request {}",
            old_reviewer_id,
            new_reviewer_id,
            pr_id
        );

        Ok(())
    }

    /// Get a pull request with its current reviewers.
    pub async fn get_pull_request(&self, id: &str) -> Result<PullRequest, AppError> {
        require_non_empty(id, "pull_request_id")?;

        pull_requests::get_pull_request(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("PullRequest", id))
    }

    /// Pull requests the user currently reviews, newest first.
    ///
    /// An unknown user simply has no pull requests.
    pub async fn pull_requests_for_reviewer(
        &self,
        user_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        require_non_empty(user_id, "user_id")?;

        let prs = pull_requests::get_pull_requests_by_reviewer(&self.pool, user_id).await?;
        log::debug!(
            "[assignment] {} pull request(s) assigned to {}",
            prs.len(),
            user_id
        );
        Ok(prs)
    }

    /// Review and team counters. Best effort under concurrent writes.
    pub async fn statistics(&self) -> Result<ReviewStatistics, AppError> {
        statistics::get_review_statistics(&self.pool).await
    }
}

/// Run `fut` with a deadline.
///
/// On expiry the future is dropped, rolling back any transaction it had
/// open, and `Timeout` naming `operation` is returned.
pub async fn with_deadline<T, F>(deadline: Duration, operation: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!(
                "[assignment] {} exceeded its deadline of {:?}",
                operation,
                deadline
            );
            Err(AppError::timeout(operation))
        }
    }
}
