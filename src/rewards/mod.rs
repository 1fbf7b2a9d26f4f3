//! The rewards facade — the only entry point other services call to award
//! points or read the consolidated rewards view. Composes the ledger,
//! aggregate, badge, and challenge repositories over one pool.

use serde::Serialize;
use sqlx::{PgPool, Result as SqlxResult};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::db::prelude::*;

pub mod level;

pub type RewardsResult<T> = core::result::Result<T, RewardsError>;

#[derive(Debug, Error)]
pub enum RewardsError {
    #[error("validation failure: {0}")]
    Validation(String),

    #[error("no active challenge with id '{0}'")]
    ChallengeNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// Result of one award. The points/level fields are authoritative and
/// transactional; the badge fields report the best-effort sweep that runs
/// after the award commits.
#[derive(Debug, Serialize)]
pub struct AwardOutcome {
    pub points: i64,
    pub total_points: i64,
    pub level: i64,
    pub leveled_up: bool,
    pub coins: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_badges: Vec<Badge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_sweep_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub rewards: UserRewards,
    pub level_progress_percent: f64,
    pub xp_to_next_level: i64,
    pub badges: Vec<EarnedBadge>,
    pub history: Vec<PointsHistoryEntry>,
    pub challenges: Vec<ChallengeWithProgress>,
}

/// Progress write result; `payout` is present when this call completed the
/// challenge and its reward was awarded
#[derive(Debug, Serialize)]
pub struct ProgressOutcome {
    #[serde(flatten)]
    pub progress: UserChallengeProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<AwardOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_error: Option<String>,
}

pub struct RewardsService {
    pool: &'static PgPool,
}

impl RewardsService {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    /// The single write path for point-earning actions. Ledger append and
    /// aggregate increment commit as one transaction; the badge sweep runs
    /// afterwards and its failure never fails the award.
    #[instrument(skip(self, user_id, reason, source), fields(user = user_id.0, source = source.as_str()))]
    pub async fn award_points(
        &self,
        user_id: &UserId,
        points: i64,
        reason: &str,
        source: PointSource,
    ) -> RewardsResult<AwardOutcome> {
        if points == 0 {
            return Err(RewardsError::Validation("points must be non-zero".into()));
        }
        if reason.trim().is_empty() {
            return Err(RewardsError::Validation("reason must not be blank".into()));
        }

        let entry = PointsHistoryEntry {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            points,
            reason: reason.trim().to_string(),
            source,
            created_at: chrono::Utc::now().naive_utc(),
        };

        let snapshot = Tx::with_tx(self.pool, |mut tx| async move {
            let result = async {
                tx.append_entry(&entry).await?;
                tx.apply_delta(&entry.user_id, entry.points).await
            }
            .await;

            (tx, result)
        })
        .await?;

        // the row lock serializes increments, so the pre-award XP for this
        // call is exactly the returned total minus this delta
        let prior_level = level::level_for_xp(snapshot.experience_points - points);
        let leveled_up = snapshot.current_level > prior_level;

        let (new_badges, badge_sweep_error) = match self.evaluate_badges(user_id).await {
            Ok(badges) => (badges, None),
            Err(e) => {
                tracing::warn!(error = ?e, user = user_id.0, "badge sweep failed after award");
                (Vec::new(), Some(e.to_string()))
            }
        };

        if leveled_up {
            tracing::info!(user = user_id.0, level = snapshot.current_level, "level up");
        }

        Ok(AwardOutcome {
            points,
            total_points: snapshot.total_points,
            level: snapshot.current_level,
            leveled_up,
            coins: snapshot.coins,
            new_badges,
            badge_sweep_error,
        })
    }

    /// Awards every newly unlocked badge at most once. Safe to call
    /// repeatedly; a second pass with no intervening point change awards
    /// nothing.
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn evaluate_badges(&self, user_id: &UserId) -> SqlxResult<Vec<Badge>> {
        let rewards = RewardsRepository::new(self.pool).get_or_create(user_id).await?;

        BadgeRepository::new(self.pool)
            .award_unlocked(user_id, rewards.total_points)
            .await
    }

    /// Read-only composite view; the only side effect is the lazy creation
    /// of the default rewards row on a user's first access
    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn get_dashboard(&self, user_id: &UserId) -> RewardsResult<Dashboard> {
        let rewards = RewardsRepository::new(self.pool).get_or_create(user_id).await?;

        let badge_repo = BadgeRepository::new(self.pool);
        let ledger_repo = LedgerRepository::new(self.pool);
        let challenge_repo = ChallengeRepository::new(self.pool);
        let (badges, history, challenges) = tokio::try_join!(
            badge_repo.earned_for(user_id),
            ledger_repo.list_recent(user_id, 20),
            challenge_repo.today_with_progress(user_id),
        )?;

        let level_progress_percent =
            level::level_progress_percent(rewards.current_level, rewards.experience_points);
        let xp_to_next_level =
            level::xp_for_next_level(rewards.current_level, rewards.experience_points);

        Ok(Dashboard {
            rewards,
            level_progress_percent,
            xp_to_next_level,
            badges,
            history,
            challenges,
        })
    }

    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn today_challenges(
        &self,
        user_id: &UserId,
    ) -> RewardsResult<Vec<ChallengeWithProgress>> {
        Ok(ChallengeRepository::new(self.pool)
            .today_with_progress(user_id)
            .await?)
    }

    #[instrument(skip(self, user_id), fields(user = user_id.0))]
    pub async fn recent_history(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> RewardsResult<Vec<PointsHistoryEntry>> {
        Ok(LedgerRepository::new(self.pool)
            .list_recent(user_id, limit)
            .await?)
    }

    /// Increments today's progress toward an active challenge. When the
    /// increment newly completes the challenge, its reward is paid through
    /// [`RewardsService::award_points`] best-effort — the recorded progress
    /// stands even if the payout fails.
    #[instrument(skip(self, user_id, challenge_id), fields(user = user_id.0, challenge = %challenge_id))]
    pub async fn record_progress(
        &self,
        user_id: &UserId,
        challenge_id: Uuid,
        amount: i64,
    ) -> RewardsResult<ProgressOutcome> {
        if amount < 1 {
            return Err(RewardsError::Validation("amount must be at least 1".into()));
        }

        let repo = ChallengeRepository::new(self.pool);
        let challenge = match repo.get_by_id(&challenge_id).await? {
            Some(ch) if ch.is_active => ch,
            _ => return Err(RewardsError::ChallengeNotFound(challenge_id)),
        };

        let progress = repo.record_progress(user_id, &challenge, amount).await?;

        // completed flipped on this call iff the pre-increment progress was
        // still short of the target
        let newly_completed =
            progress.completed && progress.progress - amount < progress.target;

        let (payout, payout_error) = if newly_completed && challenge.points_reward > 0 {
            let reason = format!("daily challenge: {}", challenge.title);
            match self
                .award_points(user_id, challenge.points_reward, &reason, PointSource::Bonus)
                .await
            {
                Ok(outcome) => (Some(outcome), None),
                Err(e) => {
                    tracing::warn!(error = ?e, user = user_id.0, "challenge payout failed");
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Ok(ProgressOutcome {
            progress,
            payout,
            payout_error,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_award_outcome_serializes_warning_fields_only_when_set() {
        let outcome = AwardOutcome {
            points: 50,
            total_points: 50,
            level: 1,
            leveled_up: false,
            coins: 0,
            new_badges: Vec::new(),
            badge_sweep_error: None,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["points"], 50);
        assert_eq!(json["leveled_up"], false);
        assert!(json.get("new_badges").is_none());
        assert!(json.get("badge_sweep_error").is_none());
    }

    #[test]
    fn test_validation_messages() {
        let zero = RewardsError::Validation("points must be non-zero".into());
        assert!(zero.to_string().contains("non-zero"));

        let missing = RewardsError::ChallengeNotFound(Uuid::nil());
        assert!(missing.to_string().contains("no active challenge"));
    }
}
