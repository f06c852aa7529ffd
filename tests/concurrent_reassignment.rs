//! Concurrency tests.
//!
//! Several engine operations run at once against one pool. The database
//! serializes writers, so racing reassignments must never both act on the
//! same stale reviewer set and racing creates must never share an id.

use futures::future::join_all;
use reviewer_service::db::pool::PoolSettings;
use reviewer_service::error::AppError;
use reviewer_service::models::{NewTeam, NewUser, TeamMember};
use reviewer_service::services::assignment::AssignmentEngine;
use reviewer_service::services::directory;
use tempfile::tempdir;

async fn setup_engine(members: &[&str]) -> AssignmentEngine {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    std::mem::forget(dir);

    let pool = reviewer_service::db::initialize(&db_path, PoolSettings::default())
        .await
        .unwrap();

    directory::create_team(
        &pool,
        &NewTeam {
            team_name: "T".to_string(),
            members: members
                .iter()
                .map(|id| TeamMember {
                    id: id.to_string(),
                    username: id.to_string(),
                    is_active: true,
                })
                .collect(),
        },
    )
    .await
    .unwrap();

    AssignmentEngine::new(pool)
}

async fn add_member(engine: &AssignmentEngine, id: &str) {
    directory::register_user(
        engine.pool(),
        &NewUser {
            id: id.to_string(),
            username: id.to_string(),
            is_active: true,
            team_name: Some("T".to_string()),
        },
    )
    .await
    .unwrap();
}

/// Test: two reviewers replaced at once compete for one free teammate.
///
/// Scenario:
/// 1. Team {A, R1, R2}; A opens P1, reviewers are R1 and R2
/// 2. R1 and R2 are deactivated, R3 joins the team
/// 3. reassign(P1, R1) and reassign(P1, R2) run concurrently
/// 4. Exactly one wins (takes R3), the other finds nobody left
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reassign_of_different_reviewers() {
    for round in 0..5 {
        let engine = setup_engine(&["A", "R1", "R2"]).await;
        let pr = engine.create_pull_request("P1", "Race", "A").await.unwrap();
        assert_eq!(pr.assigned_reviewers, vec!["R1", "R2"]);
        for id in ["R1", "R2"] {
            directory::set_user_active(engine.pool(), id, false)
                .await
                .unwrap();
        }
        add_member(&engine, "R3").await;

        let handles = ["R1", "R2"].map(|old| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reassign_reviewer("P1", old).await })
        });
        let results: Vec<Result<(), AppError>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "round {}: {:?}", round, results);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::NoAvailableReviewer { .. }))));

        let after = engine.get_pull_request("P1").await.unwrap();
        assert_eq!(after.assigned_reviewers.len(), 2);
        assert_ne!(after.assigned_reviewers[0], after.assigned_reviewers[1]);
        assert!(after.assigned_reviewers.contains(&"R3".to_string()));
        assert!(!after.assigned_reviewers.contains(&"A".to_string()));
    }
}

/// Test: the same reviewer replaced twice at once.
///
/// The loser sees the reviewer already gone and fails with NotAssigned.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reassign_of_same_reviewer() {
    let engine = setup_engine(&["A", "R1"]).await;
    engine.create_pull_request("P1", "Race", "A").await.unwrap();
    add_member(&engine, "R2").await;
    add_member(&engine, "R3").await;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reassign_reviewer("P1", "R1").await })
        })
        .collect();
    let results: Vec<Result<(), AppError>> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "{:?}", results);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::NotAssigned { .. }))));

    let after = engine.get_pull_request("P1").await.unwrap();
    assert_eq!(after.assigned_reviewers.len(), 1);
    assert!(["R2", "R3"].contains(&after.assigned_reviewers[0].as_str()));
}

/// Test: creates racing on one id produce exactly one pull request.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_same_id() {
    let engine = setup_engine(&["A", "R1", "R2", "R3"]).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .create_pull_request("P1", &format!("Attempt {}", i), "A")
                    .await
            })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(AppError::Conflict { .. })), "{:?}", result);
    }

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pull_request_reviewers WHERE pr_id = 'P1'")
        .fetch_one(engine.pool())
        .await
        .unwrap();
    assert_eq!(rows, 2);
}

/// Test: creates, merges and statistics on different pull requests proceed
/// side by side.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_workload() {
    let engine = setup_engine(&["A", "R1", "R2", "R3"]).await;

    let creates: Vec<_> = (0..20)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let id = format!("P{}", i);
                engine.create_pull_request(&id, "Change", "A").await?;
                if i % 2 == 0 {
                    engine.merge_pull_request(&id).await?;
                }
                engine.statistics().await?;
                Ok::<_, AppError>(())
            })
        })
        .collect();

    for joined in join_all(creates).await {
        joined.unwrap().unwrap();
    }

    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.total_prs, 20);
    assert_eq!(stats.merged_prs, 10);
    assert_eq!(stats.open_prs, 10);

    let assigned: i64 = stats.reviewer_stats.iter().map(|r| r.assigned_prs_count).sum();
    assert_eq!(assigned, 40);
    assert!(stats
        .reviewer_stats
        .iter()
        .all(|r| r.reviewer_id != "A" || r.assigned_prs_count == 0));
}
