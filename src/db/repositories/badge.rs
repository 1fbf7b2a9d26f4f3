use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;
use uuid::Uuid;

use super::sql_fragment;
use crate::db::{
    models::badge::{Badge, EarnedBadge, EarnedBadgeRow},
    models::rewards::UserId,
    repositories::Repository,
};

#[derive(Debug)]
pub struct BadgeRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for BadgeRepository {
    type Ident = Uuid;
    type Output = Badge;

    const BASE_FIELDS: &'static str = sql_fragment::BADGE_FIELDS;
    const TABLE_NAME: &'static str = "badges";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl BadgeRepository {
    /// Awards every catalog badge whose threshold `total_points` now meets
    /// and which the user does not already hold, returning only the newly
    /// earned ones. ON CONFLICT DO NOTHING makes the sweep idempotent and
    /// absorbs races between concurrent evaluations.
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn award_unlocked(
        &self,
        user_id: &UserId,
        total_points: i64,
    ) -> SqlxResult<Vec<Badge>> {
        let new_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO user_badges (id, user_id, badge_id, earned_at)
            SELECT gen_random_uuid(), $1, b.id, NOW()
            FROM badges b
            WHERE b.points_required <= $2
            ON CONFLICT (user_id, badge_id)
            DO NOTHING
            RETURNING badge_id
            "#,
        )
        .bind(user_id)
        .bind(total_points)
        .fetch_all(self.pool)
        .await?;

        if new_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Badge>(
            r#"
            SELECT
                id,
                name,
                description,
                icon,
                category,
                points_required
            FROM badges
            WHERE id = ANY($1)
            ORDER BY points_required ASC
            "#,
        )
        .bind(&new_ids)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn earned_for(&self, user_id: &UserId) -> SqlxResult<Vec<EarnedBadge>> {
        let rows = sqlx::query_as::<_, EarnedBadgeRow>(
            r#"
            SELECT
                ub.id,
                ub.earned_at,
                b.id AS badge_id,
                b.name,
                b.description,
                b.icon,
                b.category,
                b.points_required
            FROM user_badges ub
            JOIN badges b ON b.id = ub.badge_id
            WHERE ub.user_id = $1
            ORDER BY ub.earned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(EarnedBadgeRow::into_earned).collect())
    }
}
