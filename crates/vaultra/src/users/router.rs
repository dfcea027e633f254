use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};

use super::domain::{BusinessUpdate, NewBusiness, UserUpdate};
use crate::error::ApiError;
use crate::http::{ApiJson, ApiPath, ApiState, CurrentUser};
use crate::ids::BusinessId;

pub fn users_router() -> Router<ApiState> {
    Router::new()
        .route("/users/me", get(me_handler).patch(update_me_handler))
        .route("/users/businesses", post(create_business_handler))
        .route("/users/businesses/:business_id", patch(update_business_handler))
}

pub(crate) async fn me_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
) -> Result<Response, ApiError> {
    let profile = state.users.profile(user.user_id)?;
    Ok(Json(profile).into_response())
}

async fn update_me_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Response, ApiError> {
    let updated = state.users.update_profile(user.user_id, update)?;
    Ok(Json(updated).into_response())
}

async fn create_business_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<NewBusiness>,
) -> Result<Response, ApiError> {
    let business = state.users.create_business(user.user_id, request)?;
    Ok((StatusCode::CREATED, Json(business)).into_response())
}

async fn update_business_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(business_id): ApiPath<BusinessId>,
    ApiJson(update): ApiJson<BusinessUpdate>,
) -> Result<Response, ApiError> {
    let business = state
        .users
        .update_business(business_id, user.user_id, update)?;
    Ok(Json(business).into_response())
}
