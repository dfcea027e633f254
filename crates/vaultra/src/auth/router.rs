use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::service::{LoginRequest, SignupRequest};
use crate::error::ApiError;
use crate::http::{ApiJson, ApiState};
use crate::users::router::me_handler;

pub fn auth_router() -> Router<ApiState> {
    Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/me", get(me_handler))
}

async fn signup_handler(
    State(state): State<ApiState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<Response, ApiError> {
    let session = state.auth.signup(request)?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

async fn login_handler(
    State(state): State<ApiState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let session = state.auth.login(request)?;
    Ok(Json(session).into_response())
}
