//! Team queries.

use super::pool::DbPool;
use super::users;
use crate::error::{is_unique_violation, AppError};
use crate::models::{NewTeam, NewUser, Team};

/// Create a team and upsert all of its members in one transaction.
///
/// Fails with `Conflict` if the team already exists; nothing is written in
/// that case or on any other failure.
pub async fn create_team(pool: &DbPool, team: &NewTeam) -> Result<Team, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO teams (name) VALUES (?)")
        .bind(&team.team_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(format!("team {} already exists", team.team_name))
            } else {
                AppError::from(e)
            }
        })?;

    for member in &team.members {
        let user = NewUser {
            id: member.id.clone(),
            username: member.username.clone(),
            is_active: member.is_active,
            team_name: Some(team.team_name.clone()),
        };
        users::upsert_user(&mut *tx, &user).await?;
    }

    let members = users::get_users_by_team(&mut *tx, &team.team_name).await?;

    tx.commit().await?;

    log::info!(
        "[store] Created team {} with {} member(s)",
        team.team_name,
        members.len()
    );

    Ok(Team {
        team_name: team.team_name.clone(),
        members,
    })
}

/// Check whether a team exists.
pub async fn team_exists(pool: &DbPool, team_name: &str) -> Result<bool, AppError> {
    let exists = sqlx::query("SELECT 1 FROM teams WHERE name = ?")
        .bind(team_name)
        .fetch_optional(pool)
        .await?
        .is_some();

    Ok(exists)
}

/// Get a team with its members.
///
/// # Returns
/// `None` if the team does not exist.
pub async fn get_team_with_members(
    pool: &DbPool,
    team_name: &str,
) -> Result<Option<Team>, AppError> {
    if !team_exists(pool, team_name).await? {
        return Ok(None);
    }

    let members = users::get_users_by_team(pool, team_name).await?;

    Ok(Some(Team {
        team_name: team_name.to_string(),
        members,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::PoolSettings;
    use crate::models::TeamMember;
    use tempfile::tempdir;

    async fn setup_test_db() -> DbPool {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::mem::forget(dir);

        crate::db::initialize(&db_path, PoolSettings::default())
            .await
            .unwrap()
    }

    fn member(id: &str, username: &str) -> TeamMember {
        TeamMember {
            id: id.to_string(),
            username: username.to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_create_team_with_members() {
        let pool = setup_test_db().await;

        let team = create_team(
            &pool,
            &NewTeam {
                team_name: "payments".to_string(),
                members: vec![member("u2", "bob"), member("u1", "alice")],
            },
        )
        .await
        .unwrap();

        assert_eq!(team.team_name, "payments");
        let names: Vec<&str> = team.members.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        let fetched = get_team_with_members(&pool, "payments")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.members.len(), 2);
    }

    #[tokio::test]
    async fn test_create_team_moves_existing_user() {
        let pool = setup_test_db().await;

        create_team(
            &pool,
            &NewTeam {
                team_name: "old".to_string(),
                members: vec![member("u1", "alice")],
            },
        )
        .await
        .unwrap();

        create_team(
            &pool,
            &NewTeam {
                team_name: "new".to_string(),
                members: vec![member("u1", "alice")],
            },
        )
        .await
        .unwrap();

        let old = get_team_with_members(&pool, "old").await.unwrap().unwrap();
        assert!(old.members.is_empty());
        let new = get_team_with_members(&pool, "new").await.unwrap().unwrap();
        assert_eq!(new.members[0].id, "u1");
    }

    #[tokio::test]
    async fn test_duplicate_team_is_conflict_and_writes_nothing() {
        let pool = setup_test_db().await;

        create_team(
            &pool,
            &NewTeam {
                team_name: "payments".to_string(),
                members: vec![],
            },
        )
        .await
        .unwrap();

        let err = create_team(
            &pool,
            &NewTeam {
                team_name: "payments".to_string(),
                members: vec![member("u9", "zed")],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        let user = users::get_user(&pool, "u9").await.unwrap();
        assert!(user.is_none(), "member upsert must be rolled back");
    }

    #[tokio::test]
    async fn test_missing_team() {
        let pool = setup_test_db().await;
        assert!(get_team_with_members(&pool, "ghost").await.unwrap().is_none());
    }
}
