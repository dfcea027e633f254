use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::domain::{Recommendation, RecommendationList, StatusUpdate};
use super::service::RecommendationService;
use crate::error::ApiError;
use crate::http::{ApiJson, ApiPath, ApiQuery, ApiState, CurrentUser};
use crate::ids::{BusinessId, RecommendationId};

pub fn recommendations_router() -> Router<ApiState> {
    Router::new()
        .route("/recommendations", get(list_handler))
        .route("/recommendations/:recommendation_id", patch(update_handler))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    business_id: BusinessId,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

async fn list_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<RecommendationList>, ApiError> {
    state.users.assert_member(query.business_id, user.user_id)?;
    let filter =
        RecommendationService::parse_filter(query.status.as_deref(), query.priority.as_deref())?;
    Ok(Json(state.recommendations.list(query.business_id, filter)?))
}

async fn update_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(recommendation_id): ApiPath<RecommendationId>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<Recommendation>, ApiError> {
    let updated = state.recommendations.update_status(
        recommendation_id,
        user.user_id,
        &update.status,
        Utc::now(),
    )?;
    Ok(Json(updated))
}
