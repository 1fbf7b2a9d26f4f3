use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use crate::db::prelude::*;
use crate::rewards::{RewardsError, RewardsService, level};

pub trait TestUser {
    fn generate_test_user() -> UserId {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();

        UserId(format!("test_user_{suffix}"))
    }
}

pub trait TestChallenge {
    fn generate_test_challenge(target: i64) -> DailyChallenge {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(7)
            .map(char::from)
            .collect();

        DailyChallenge {
            id: Uuid::new_v4(),
            title: format!("test challenge {suffix}"),
            description: "fixture".to_string(),
            points_reward: 20,
            target,
            challenge_type: ChallengeType::Checkin,
            is_active: true,
        }
    }
}

impl TestUser for UserId {}
impl TestChallenge for DailyChallenge {}

async fn insert_challenge(challenge: &DailyChallenge) {
    let pool = db_pool().await.unwrap();
    sqlx::query(
        r#"
        INSERT INTO daily_challenges (
            id, title, description, points_reward, target, challenge_type, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(challenge.id)
    .bind(&challenge.title)
    .bind(&challenge.description)
    .bind(challenge.points_reward)
    .bind(challenge.target)
    .bind(challenge.challenge_type)
    .bind(challenge.is_active)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_award_accumulates_and_levels() {
    let pool = db_pool().await.unwrap();
    let service = RewardsService::new(pool);
    let user = UserId::generate_test_user();

    let first = service
        .award_points(&user, 50, "daily checkin", PointSource::Checkin)
        .await
        .unwrap();

    assert_eq!(first.points, 50);
    assert_eq!(first.total_points, 50);
    assert_eq!(first.level, 1);
    assert!(!first.leveled_up);
    assert_eq!(level::level_progress_percent(1, 50), 50.0);

    // the 10-point seed badge unlocks on the first award
    assert!(first.new_badges.iter().any(|b| b.points_required == 10));

    let second = service
        .award_points(&user, 60, "streak bonus", PointSource::Streak)
        .await
        .unwrap();

    assert_eq!(second.total_points, 110);
    assert_eq!(second.level, 2);
    assert!(second.leveled_up);
    assert_eq!(level::xp_for_next_level(2, 110), 90);

    // crossing 100 unlocks the 100-point badge exactly once
    assert!(second.new_badges.iter().any(|b| b.points_required == 100));
    let third_sweep = service.evaluate_badges(&user).await.unwrap();
    assert!(third_sweep.is_empty());

    // aggregate stays consistent with the ledger sum
    let ledger_sum = LedgerRepository::new(pool).sum_for_user(&user).await.unwrap();
    assert_eq!(ledger_sum, second.total_points);

    let history = LedgerRepository::new(pool).list_recent(&user, 20).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].points, 60); // newest first
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_concurrent_awards_lose_no_updates() {
    let pool = db_pool().await.unwrap();
    let user = UserId::generate_test_user();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            RewardsService::new(pool)
                .award_points(&user, 10, "checkin", PointSource::Checkin)
                .await
                .unwrap();
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = RewardsRepository::new(pool).get_or_create(&user).await.unwrap();
    assert_eq!(snapshot.total_points, 100);
    assert_eq!(snapshot.experience_points, 100);
    assert_eq!(snapshot.current_level, 2);

    let ledger_sum = LedgerRepository::new(pool).sum_for_user(&user).await.unwrap();
    assert_eq!(ledger_sum, 100);
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_lazy_create_race_yields_one_row() {
    let pool = db_pool().await.unwrap();
    let user = UserId::generate_test_user();
    let repo = RewardsRepository::new(pool);

    let (a, b) = tokio::join!(repo.get_or_create(&user), repo.get_or_create(&user));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.user_id, b.user_id);
    assert_eq!(a.total_points, 0);
    assert_eq!(b.total_points, 0);
    assert_eq!(a.current_level, 1);
    assert_eq!(a.created_at, b.created_at);
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_challenge_progress_completes_and_pays_out() {
    let pool = db_pool().await.unwrap();
    let service = RewardsService::new(pool);
    let user = UserId::generate_test_user();

    let challenge = DailyChallenge::generate_test_challenge(3);
    insert_challenge(&challenge).await;

    let first = service.record_progress(&user, challenge.id, 1).await.unwrap();
    assert_eq!(first.progress.progress, 1);
    assert!(!first.progress.completed);
    assert!(first.payout.is_none());

    let second = service.record_progress(&user, challenge.id, 1).await.unwrap();
    assert_eq!(second.progress.progress, 2);
    assert!(!second.progress.completed);

    let third = service.record_progress(&user, challenge.id, 1).await.unwrap();
    assert_eq!(third.progress.progress, 3);
    assert!(third.progress.completed);

    // the completing increment pays the reward through the award path
    let payout = third.payout.expect("completion should pay out");
    assert_eq!(payout.points, challenge.points_reward);

    // further progress never pays twice
    let fourth = service.record_progress(&user, challenge.id, 1).await.unwrap();
    assert_eq!(fourth.progress.progress, 4);
    assert!(fourth.progress.completed);
    assert!(fourth.payout.is_none());
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_overdraw_rolls_back_ledger_append() {
    let pool = db_pool().await.unwrap();
    let service = RewardsService::new(pool);
    let user = UserId::generate_test_user();

    service
        .award_points(&user, 50, "daily checkin", PointSource::Checkin)
        .await
        .unwrap();

    // would drive total_points to -50; the check constraint fails the
    // transaction, taking the paired ledger append down with it
    let overdraw = service
        .award_points(&user, -100, "manual adjustment", PointSource::Bonus)
        .await;
    assert!(matches!(overdraw, Err(RewardsError::Store(_))));

    let snapshot = RewardsRepository::new(pool).get_or_create(&user).await.unwrap();
    assert_eq!(snapshot.total_points, 50);
    assert_eq!(snapshot.experience_points, 50);

    let history = LedgerRepository::new(pool).list_recent(&user, 20).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].points, 50);

    let ledger_sum = LedgerRepository::new(pool).sum_for_user(&user).await.unwrap();
    assert_eq!(ledger_sum, snapshot.total_points);
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_new_day_starts_fresh_progress() {
    let pool = db_pool().await.unwrap();
    let service = RewardsService::new(pool);
    let user = UserId::generate_test_user();

    let challenge = DailyChallenge::generate_test_challenge(3);
    insert_challenge(&challenge).await;

    // a completed row from yesterday must not carry into today
    sqlx::query(
        r#"
        INSERT INTO user_challenges (
            user_id, challenge_id, date, progress, target, completed,
            created_at, updated_at
        )
        VALUES (
            $1, $2, CURRENT_DATE - 1, $3, $3, TRUE,
            NOW() - INTERVAL '1 day', NOW() - INTERVAL '1 day'
        )
        "#,
    )
    .bind(&user)
    .bind(challenge.id)
    .bind(challenge.target)
    .execute(pool)
    .await
    .unwrap();

    let today: chrono::NaiveDate = sqlx::query_scalar("SELECT CURRENT_DATE")
        .fetch_one(pool)
        .await
        .unwrap();

    let outcome = service.record_progress(&user, challenge.id, 1).await.unwrap();
    assert_eq!(outcome.progress.date, today);
    assert_eq!(outcome.progress.progress, 1);
    assert!(!outcome.progress.completed);
    assert!(outcome.payout.is_none());

    // the listing joins on today's row only
    let listed = service.today_challenges(&user).await.unwrap();
    let entry = listed
        .iter()
        .find(|c| c.id == challenge.id)
        .expect("fixture challenge should be listed");

    assert_eq!(entry.progress, 1);
    assert_eq!(entry.target, challenge.target);
    assert!(!entry.completed);
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_unknown_challenge_is_not_found() {
    let pool = db_pool().await.unwrap();
    let service = RewardsService::new(pool);
    let user = UserId::generate_test_user();

    let result = service.record_progress(&user, Uuid::new_v4(), 1).await;
    assert!(matches!(result, Err(RewardsError::ChallengeNotFound(_))));
}

#[tokio::test]
#[ignore = "requires a running postgres (DATABASE_URL)"]
async fn test_today_challenges_default_progress() {
    let pool = db_pool().await.unwrap();
    let service = RewardsService::new(pool);
    let user = UserId::generate_test_user();

    let challenge = DailyChallenge::generate_test_challenge(2);
    insert_challenge(&challenge).await;
    assert!(ChallengeRepository::new(pool).exists(&challenge.id).await.unwrap());

    let today = service.today_challenges(&user).await.unwrap();
    let entry = today
        .iter()
        .find(|c| c.id == challenge.id)
        .expect("fixture challenge should be listed");

    assert_eq!(entry.progress, 0);
    assert_eq!(entry.target, 2);
    assert!(!entry.completed);
}
