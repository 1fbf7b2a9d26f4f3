use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub String);

/// Base user_rewards table model — one denormalized snapshot per user,
/// mutated only through the rewards facade
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRewards {
    pub user_id: UserId,
    pub total_points: i64,
    pub current_level: i64,
    pub experience_points: i64,
    pub coins: i64,
    #[serde(skip_serializing)]
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing)]
    pub updated_at: NaiveDateTime,
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
