use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;
use uuid::Uuid;

use super::sql_fragment;
use crate::db::{
    models::ledger::PointsHistoryEntry,
    models::rewards::UserId,
    repositories::Repository,
};

/// Hard ceiling on history reads; the UI asks for 20
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug)]
pub struct LedgerRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for LedgerRepository {
    type Ident = Uuid;
    type Output = PointsHistoryEntry;

    const BASE_FIELDS: &'static str = sql_fragment::LEDGER_FIELDS;
    const TABLE_NAME: &'static str = "points_history";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl LedgerRepository {
    /// Most recent entries first. Each call re-queries for a fresh
    /// consistent snapshot; this is not a change stream.
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn list_recent(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> SqlxResult<Vec<PointsHistoryEntry>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);

        sqlx::query_as::<_, PointsHistoryEntry>(
            r#"
            SELECT
                id,
                user_id,
                points,
                reason,
                source,
                created_at
            FROM points_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
    }

    /// Ledger sum for a user; the consistency check against
    /// user_rewards.total_points lives in the integration tests
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn sum_for_user(&self, user_id: &UserId) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(points), 0)::BIGINT FROM points_history WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await
    }
}
