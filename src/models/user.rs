use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An account. The id is the JWT subject claim.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub plan: String,
    pub created_at: i64,
    pub updated_at: i64,
}
