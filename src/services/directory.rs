//! Team directory: user registration, activation and team creation.

use crate::db::pool::DbPool;
use crate::db::{teams, users};
use crate::error::{require_non_empty, AppError};
use crate::models::{NewTeam, NewUser, Team, User};

/// Register a user, or update name, active flag and team of an existing one.
pub async fn register_user(pool: &DbPool, user: &NewUser) -> Result<User, AppError> {
    require_non_empty(&user.id, "user_id")?;
    require_non_empty(&user.username, "username")?;
    if let Some(team_name) = &user.team_name {
        require_non_empty(team_name, "team_name")?;
    }

    let stored = users::upsert_user(pool, user).await?;
    log::info!(
        "[directory] Registered user {} (active: {}, team: {:?})",
        stored.id,
        stored.is_active,
        stored.team_name
    );
    Ok(stored)
}

pub async fn get_user(pool: &DbPool, id: &str) -> Result<User, AppError> {
    require_non_empty(id, "user_id")?;

    users::get_user(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", id))
}

/// Activate or deactivate a user.
///
/// Deactivated users are skipped by reviewer selection and reassignment.
/// Pull requests they already review keep them.
pub async fn set_user_active(pool: &DbPool, id: &str, is_active: bool) -> Result<User, AppError> {
    require_non_empty(id, "user_id")?;

    let user = users::set_user_active(pool, id, is_active)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", id))?;

    log::info!("[directory] User {} is_active set to {}", id, is_active);
    Ok(user)
}

/// Create a team and register all of its members in one transaction.
pub async fn create_team(pool: &DbPool, team: &NewTeam) -> Result<Team, AppError> {
    require_non_empty(&team.team_name, "team_name")?;
    for member in &team.members {
        require_non_empty(&member.id, "user_id")?;
        require_non_empty(&member.username, "username")?;
    }

    teams::create_team(pool, team).await
}

pub async fn get_team(pool: &DbPool, team_name: &str) -> Result<Team, AppError> {
    require_non_empty(team_name, "team_name")?;

    teams::get_team_with_members(pool, team_name)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("Team", team_name))
}
