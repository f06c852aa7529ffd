//! Team model.

use super::user::{default_active, User};
use serde::{Deserialize, Serialize};

/// A team and its current members.
#[derive(Debug, Clone, Serialize)]
pub struct Team {
    pub team_name: String,
    /// Members ordered by username.
    pub members: Vec<User>,
}

/// A member entry in a team creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamMember {
    #[serde(alias = "user_id")]
    pub id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Input for creating a team together with its members.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}
