use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::{
    models::rewards::{UserId, UserRewards},
    repositories::Repository,
};

#[derive(Debug)]
pub struct RewardsRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for RewardsRepository {
    type Ident = UserId;
    type Output = UserRewards;

    const BASE_FIELDS: &'static str = sql_fragment::REWARDS_FIELDS;
    const TABLE_NAME: &'static str = "user_rewards";
    const ID_COLUMN: &'static str = "user_id";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl RewardsRepository {
    /// Lazily creates the default row (level 1, zero points) on first
    /// access. A duplicate-key race between two first-time callers is
    /// benign: DO NOTHING, then read back whichever insert won.
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn get_or_create(&self, user_id: &UserId) -> SqlxResult<UserRewards> {
        sqlx::query(
            r#"
            INSERT INTO user_rewards (
                user_id,
                total_points,
                current_level,
                experience_points,
                coins,
                created_at,
                updated_at
            )
            VALUES ($1, 0, 1, 0, 0, NOW(), NOW())
            ON CONFLICT (user_id)
            DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        sqlx::query_as::<_, UserRewards>(
            r#"
            SELECT
                user_id,
                total_points,
                current_level,
                experience_points,
                coins,
                created_at,
                updated_at
            FROM user_rewards
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await
    }
}
