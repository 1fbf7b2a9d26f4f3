use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rewards::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "challenge_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    Checkin,
    Streak,
    Community,
    Reflection,
    Gratitude,
}

/// Base daily_challenges catalog model
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyChallenge {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub points_reward: i64,
    pub target: i64,
    pub challenge_type: ChallengeType,
    pub is_active: bool,
}

/// Base user_challenges table model. One logical row per
/// (user, challenge, calendar day); progress never carries over to the
/// next day.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserChallengeProgress {
    pub user_id: UserId,
    pub challenge_id: Uuid,
    pub date: NaiveDate,
    pub progress: i64,
    pub target: i64,
    pub completed: bool,
    #[serde(skip_serializing)]
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing)]
    pub updated_at: NaiveDateTime,
}

/// Active challenge joined with today's progress; progress fields default
/// to 0 / catalog target / false when no row exists yet for the day
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChallengeWithProgress {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub points_reward: i64,
    pub challenge_type: ChallengeType,
    pub progress: i64,
    pub target: i64,
    pub completed: bool,
}
