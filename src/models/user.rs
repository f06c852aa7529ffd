//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user that can author pull requests and review them.
///
/// Users are never deleted; deactivation flips `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Stable, caller-supplied identifier.
    pub id: String,

    /// Display name.
    pub username: String,

    /// Inactive users are never picked as reviewers and cannot author.
    pub is_active: bool,

    /// Team the user belongs to, if any.
    pub team_name: Option<String>,
}

/// Input for registering (or re-registering) a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub team_name: Option<String>,
}

pub(crate) fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults_to_active() {
        let user: NewUser = serde_json::from_str(r#"{"id": "u1", "username": "alice"}"#).unwrap();
        assert!(user.is_active);
        assert_eq!(user.team_name, None);
    }
}
