use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team. `custom_url` is the external addressing key; the numeric id is
/// internal only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub custom_url: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Per-team permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TeamRole {
    Admin,
    Member,
}

impl TeamRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }
}

/// Join table mapping a user to a team, with a role. At most one row per
/// `(team_id, user_id)` pair, enforced by a schema-level UNIQUE constraint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub id: i64,
    pub team_id: i64,
    pub user_id: String,
    pub role: TeamRole,
    pub joined_at: i64,
    pub display_name: Option<String>,
    pub avatar_color: Option<String>,
}

/// A standing invite code an admin hands out so others can request to join.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamInvitation {
    pub id: i64,
    pub team_id: i64,
    pub invite_code: String,
    pub inviter_id: String,
    pub role: TeamRole,
    pub status: String,
    pub created_at: i64,
}

/// A pending request to join a team, awaiting admin approval.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamJoinRequest {
    pub id: i64,
    pub team_id: i64,
    pub user_id: String,
    pub display_name: Option<String>,
    pub status: String,
    pub created_at: i64,
    pub processed_at: Option<i64>,
}
