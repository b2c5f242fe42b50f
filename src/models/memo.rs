use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team memo. `updated_at` is the optimistic-lock version token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMemo {
    pub id: i64,
    pub team_id: i64,
    pub user_id: String,
    pub original_id: String,
    pub uuid: String,
    pub title: String,
    pub content: String,
    pub board_category_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
