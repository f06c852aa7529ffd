//! User queries.

use crate::error::{is_foreign_key_violation, AppError};
use crate::models::{NewUser, User};
use sqlx::SqliteExecutor;

/// Insert a user or update name, active flag and team of an existing one.
///
/// # Returns
/// The user as stored after the upsert. Fails with `NotFound` when the
/// referenced team does not exist.
pub async fn upsert_user<'e>(
    executor: impl SqliteExecutor<'e>,
    user: &NewUser,
) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, username, is_active, team_name)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            username = excluded.username,
            is_active = excluded.is_active,
            team_name = excluded.team_name
        RETURNING id, username, is_active, team_name
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(user.is_active)
    .bind(&user.team_name)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::not_found_with_id("Team", user.team_name.clone().unwrap_or_default())
        } else {
            AppError::from(e)
        }
    })
}

/// Get a user by id.
pub async fn get_user<'e>(
    executor: impl SqliteExecutor<'e>,
    id: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, is_active, team_name FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

/// Flip a user's active flag.
///
/// # Returns
/// The updated user, or `None` if no such user exists.
pub async fn set_user_active<'e>(
    executor: impl SqliteExecutor<'e>,
    id: &str,
    is_active: bool,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET is_active = ?
        WHERE id = ?
        RETURNING id, username, is_active, team_name
        "#,
    )
    .bind(is_active)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

/// All members of a team, ordered by username.
pub async fn get_users_by_team<'e>(
    executor: impl SqliteExecutor<'e>,
    team_name: &str,
) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, is_active, team_name
        FROM users
        WHERE team_name = ?
        ORDER BY username, id
        "#,
    )
    .bind(team_name)
    .fetch_all(executor)
    .await?;

    Ok(users)
}

/// Active members of a team other than `exclude_id`.
///
/// This is the candidate pool for initial reviewer assignment.
pub async fn get_active_team_members<'e>(
    executor: impl SqliteExecutor<'e>,
    team_name: &str,
    exclude_id: &str,
) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, is_active, team_name
        FROM users
        WHERE team_name = ? AND is_active = 1 AND id != ?
        ORDER BY username, id
        "#,
    )
    .bind(team_name)
    .bind(exclude_id)
    .fetch_all(executor)
    .await?;

    Ok(users)
}
