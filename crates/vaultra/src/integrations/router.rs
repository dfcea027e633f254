use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::domain::ConnectionStatus;
use crate::error::ApiError;
use crate::http::{ApiQuery, ApiState, BusinessQuery, CurrentUser};

const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn integrations_router() -> Router<ApiState> {
    Router::new()
        .route("/integrations/stripe/connect", get(connect_handler))
        .route("/integrations/stripe/callback", get(callback_handler))
        .route("/integrations/stripe/status", get(status_handler))
        .route("/webhooks/stripe", post(webhook_handler))
}

#[derive(Debug, Serialize)]
struct ConnectUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    status: &'static str,
}

async fn connect_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<BusinessQuery>,
) -> Result<Json<ConnectUrl>, ApiError> {
    state.users.assert_member(query.business_id, user.user_id)?;
    let url = state
        .integrations
        .connect_url(query.business_id, user.user_id, Utc::now())?;
    Ok(Json(ConnectUrl { url }))
}

async fn callback_handler(
    State(state): State<ApiState>,
    ApiQuery(query): ApiQuery<CallbackQuery>,
) -> Result<Redirect, ApiError> {
    let target = state
        .integrations
        .complete_connect(&query.code, &query.state, Utc::now())
        .await?;
    Ok(Redirect::to(&target))
}

async fn status_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<BusinessQuery>,
) -> Result<Json<ConnectionStatus>, ApiError> {
    state.users.assert_member(query.business_id, user.user_id)?;
    Ok(Json(state.integrations.status(query.business_id)?))
}

async fn webhook_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    state
        .integrations
        .handle_webhook(&body, signature, Utc::now())?;
    Ok(Json(WebhookAck { status: "ok" }))
}
