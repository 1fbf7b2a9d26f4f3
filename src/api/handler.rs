use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Json, debug_handler};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::api::server::{AppState, JsonResult};
use crate::db::models::HistoryQuery;
use crate::db::prelude::{ChallengeWithProgress, PointSource, PointsHistoryEntry, UserId};
use crate::rewards::{AwardOutcome, Dashboard, ProgressOutcome, RewardsService};

#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    pub user_id: String,
    pub points: i64,
    pub reason: String,
    pub source: PointSource,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub user_id: String,
    pub challenge_id: Uuid,
    pub amount: i64,
}

#[instrument(skip(state, req))]
#[debug_handler]
pub async fn award_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AwardRequest>,
) -> JsonResult<AwardOutcome> {
    let user_id = UserId::from(req.user_id);
    let outcome = RewardsService::new(state.db_pool)
        .award_points(&user_id, req.points, &req.reason, req.source)
        .await?;

    Ok(Json(outcome))
}

#[instrument(skip(state, req))]
#[debug_handler]
pub async fn record_progress(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProgressRequest>,
) -> JsonResult<ProgressOutcome> {
    let user_id = UserId::from(req.user_id);
    let outcome = RewardsService::new(state.db_pool)
        .record_progress(&user_id, req.challenge_id, req.amount)
        .await?;

    Ok(Json(outcome))
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> JsonResult<Dashboard> {
    let user_id = UserId::from(user_id);
    let view = RewardsService::new(state.db_pool)
        .get_dashboard(&user_id)
        .await?;

    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(param): Query<HistoryQuery>,
) -> JsonResult<Vec<PointsHistoryEntry>> {
    let user_id = UserId::from(user_id);
    let entries = RewardsService::new(state.db_pool)
        .recent_history(&user_id, param.limit)
        .await?;

    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn today_challenges(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> JsonResult<Vec<ChallengeWithProgress>> {
    let user_id = UserId::from(user_id);
    let challenges = RewardsService::new(state.db_pool)
        .today_challenges(&user_id)
        .await?;

    Ok(Json(challenges))
}
