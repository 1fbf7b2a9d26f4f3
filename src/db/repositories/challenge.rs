use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;
use uuid::Uuid;

use super::sql_fragment;
use crate::db::{
    models::challenge::{ChallengeWithProgress, DailyChallenge, UserChallengeProgress},
    models::rewards::UserId,
    repositories::Repository,
};

#[derive(Debug)]
pub struct ChallengeRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for ChallengeRepository {
    type Ident = Uuid;
    type Output = DailyChallenge;

    const BASE_FIELDS: &'static str = sql_fragment::CHALLENGE_FIELDS;
    const TABLE_NAME: &'static str = "daily_challenges";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl ChallengeRepository {
    /// Active catalog joined with today's progress rows. Missing progress
    /// defaults to 0 / catalog target / not completed; yesterday's rows
    /// never match the CURRENT_DATE join key.
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn today_with_progress(
        &self,
        user_id: &UserId,
    ) -> SqlxResult<Vec<ChallengeWithProgress>> {
        sqlx::query_as::<_, ChallengeWithProgress>(
            r#"
            SELECT
                c.id,
                c.title,
                c.description,
                c.points_reward,
                c.challenge_type,
                COALESCE(p.progress, 0) AS progress,
                COALESCE(p.target, c.target) AS target,
                COALESCE(p.completed, FALSE) AS completed
            FROM daily_challenges c
            LEFT JOIN user_challenges p
                ON p.challenge_id = c.id
                AND p.user_id = $1
                AND p.date = CURRENT_DATE
            WHERE c.is_active
            ORDER BY c.title ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await
    }

    /// Upsert-increments today's progress row. The day key is the
    /// database's CURRENT_DATE, so every replica agrees on the boundary.
    #[instrument(skip(self, user_id, challenge), fields(user = user_id.0, challenge = %challenge.id))]
    pub async fn record_progress(
        &self,
        user_id: &UserId,
        challenge: &DailyChallenge,
        amount: i64,
    ) -> SqlxResult<UserChallengeProgress> {
        sqlx::query_as::<_, UserChallengeProgress>(
            r#"
            INSERT INTO user_challenges (
                user_id,
                challenge_id,
                date,
                progress,
                target,
                completed,
                created_at,
                updated_at
            )
            VALUES ($1, $2, CURRENT_DATE, $3, $4, $3 >= $4, NOW(), NOW())
            ON CONFLICT (user_id, challenge_id, date)
            DO UPDATE SET
                progress = user_challenges.progress + $3,
                completed = user_challenges.progress + $3 >= user_challenges.target,
                updated_at = NOW()
            RETURNING
                user_id,
                challenge_id,
                date,
                progress,
                target,
                completed,
                created_at,
                updated_at
            "#,
        )
        .bind(user_id)
        .bind(challenge.id)
        .bind(amount)
        .bind(challenge.target)
        .fetch_one(self.pool)
        .await
    }
}
