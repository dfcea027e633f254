use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use super::domain::{HistoryRange, MetricSnapshot, ReadinessScore, ScoreHistory, SnapshotHistory};
use crate::error::ApiError;
use crate::http::{ApiQuery, ApiState, BusinessQuery, CurrentUser};
use crate::ids::BusinessId;

pub fn metrics_router() -> Router<ApiState> {
    Router::new()
        .route("/metrics", get(latest_metrics_handler))
        .route("/metrics/history", get(metrics_history_handler))
        .route("/readiness", get(latest_readiness_handler))
        .route("/readiness/history", get(readiness_history_handler))
}

#[derive(Debug, Deserialize)]
struct MetricsHistoryQuery {
    business_id: BusinessId,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ReadinessHistoryQuery {
    business_id: BusinessId,
    #[serde(default)]
    limit: Option<usize>,
}

async fn latest_metrics_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<BusinessQuery>,
) -> Result<Json<MetricSnapshot>, ApiError> {
    state.users.assert_member(query.business_id, user.user_id)?;
    Ok(Json(state.metrics.latest_snapshot(query.business_id)?))
}

async fn metrics_history_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<MetricsHistoryQuery>,
) -> Result<Json<SnapshotHistory>, ApiError> {
    state.users.assert_member(query.business_id, user.user_id)?;
    Ok(Json(
        state
            .metrics
            .snapshot_history(
                query.business_id,
                HistoryRange {
                    start_date: query.start_date,
                    end_date: query.end_date,
                },
            )?,
    ))
}

async fn latest_readiness_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<BusinessQuery>,
) -> Result<Json<ReadinessScore>, ApiError> {
    state.users.assert_member(query.business_id, user.user_id)?;
    Ok(Json(state.metrics.latest_score(query.business_id)?))
}

async fn readiness_history_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ReadinessHistoryQuery>,
) -> Result<Json<ScoreHistory>, ApiError> {
    state.users.assert_member(query.business_id, user.user_id)?;
    Ok(Json(
        state
            .metrics
            .score_history(query.business_id, query.limit)?,
    ))
}
