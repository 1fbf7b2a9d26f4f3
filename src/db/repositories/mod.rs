use core::fmt;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Result as SqlxResult, Transaction};
use tracing::instrument;

use crate::db::models::ledger::PointsHistoryEntry;
use crate::db::models::rewards::{UserId, UserRewards};

pub mod badge;
pub mod challenge;
pub mod ledger;
pub mod rewards;

pub struct Tx<'a> {
    inner: Option<Transaction<'a, Postgres>>,
}

impl<'a> Tx<'a> {
    /// Runs `f` inside a transaction, committing on `Ok` and letting the
    /// transaction drop (roll back) on `Err`
    #[instrument(skip(pool, f))]
    pub async fn with_tx<F, Fut, T>(pool: &'static Pool<Postgres>, f: F) -> SqlxResult<T>
    where
        F: FnOnce(Tx<'a>) -> Fut,
        Fut: Future<Output = (Tx<'a>, SqlxResult<T>)>,
    {
        let tx = Self::begin(pool).await?;
        let (mut tx, result) = f(tx).await;

        match result {
            Ok(val) => {
                tx.commit().await?;
                Ok(val)
            }
            Err(e) => {
                tracing::trace!(error = ?e, "transacted query failure");
                Err(e)
            }
        }
    }

    #[instrument(skip(pool))]
    pub async fn begin(pool: &'static Pool<Postgres>) -> SqlxResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    #[instrument(skip(self))]
    pub async fn rollback(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    fn inner_mut(&mut self) -> SqlxResult<&mut Transaction<'a, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("Transaction already completed".into()))
    }

    /// Appends one immutable ledger row. Must share a transaction with
    /// [`Tx::apply_delta`] so an award is all-or-nothing.
    #[instrument(skip(self, entry), fields(user = entry.user_id.0, points = entry.points))]
    pub async fn append_entry(&mut self, entry: &PointsHistoryEntry) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO points_history (
                id,
                user_id,
                points,
                reason,
                source,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(entry.points)
        .bind(&entry.reason)
        .bind(entry.source)
        .bind(entry.created_at)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(())
    }

    /// Server-side atomic increment of the per-user aggregate. Level and
    /// the level-up coin grant are recomputed in the same statement, so
    /// concurrent awards can never lose an increment. Flat 100-XP level
    /// windows: level = xp / 100 + 1.
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn apply_delta(&mut self, user_id: &UserId, delta: i64) -> SqlxResult<UserRewards> {
        sqlx::query_as::<_, UserRewards>(
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
            VALUES ($1, $2, $2 / 100 + 1, $2, 25 * ($2 / 100), NOW(), NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                total_points = user_rewards.total_points + $2,
                experience_points = user_rewards.experience_points + $2,
                current_level = (user_rewards.experience_points + $2) / 100 + 1,
                coins = user_rewards.coins
                    + 25 * GREATEST(0, (user_rewards.experience_points + $2) / 100
                                       - user_rewards.experience_points / 100),
                updated_at = NOW()
            RETURNING
                user_id,
                total_points,
                current_level,
                experience_points,
                coins,
                created_at,
                updated_at
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }
}

pub mod sql_fragment {
    pub const LEDGER_FIELDS: &str = r#"
        id,
        user_id,
        points,
        reason,
        source,
        created_at
    "#;

    pub const REWARDS_FIELDS: &str = r#"
        user_id,
        total_points,
        current_level,
        experience_points,
        coins,
        created_at,
        updated_at
    "#;

    pub const BADGE_FIELDS: &str = r#"
        id,
        name,
        description,
        icon,
        category,
        points_required
    "#;

    pub const CHALLENGE_FIELDS: &str = r#"
        id,
        title,
        description,
        points_reward,
        target,
        challenge_type,
        is_active
    "#;
}

#[async_trait]
pub trait Repository {
    type Ident: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, <Postgres as sqlx::Database>::Row>
        + Sized
        + Unpin
        + Send
        + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;

    /// Key column; user-keyed tables override this
    const ID_COLUMN: &'static str = "id";

    fn new(pool: &'static Pool<Postgres>) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &'static Pool<Postgres>;

    async fn exists(&self, id: &Self::Ident) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
            Self::TABLE_NAME,
            Self::ID_COLUMN
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
    }

    #[instrument(skip(self, id))]
    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE {} = $1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME,
            Self::ID_COLUMN
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }
}
