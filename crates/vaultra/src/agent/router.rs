use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use super::domain::{ChatRequest, ChatResponse, ConversationView};
use crate::error::ApiError;
use crate::http::{ApiJson, ApiPath, ApiState, CurrentUser};
use crate::ids::ConversationId;

pub fn agent_router() -> Router<ApiState> {
    Router::new()
        .route("/agent/chat", post(chat_handler))
        .route("/agent/conversations/:conversation_id", get(conversation_handler))
}

async fn chat_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    state.users.assert_member(request.business_id, user.user_id)?;
    let reply = state.agent.chat(user.user_id, request, Utc::now()).await?;
    Ok(Json(reply))
}

async fn conversation_handler(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(conversation_id): ApiPath<ConversationId>,
) -> Result<Json<ConversationView>, ApiError> {
    Ok(Json(state.agent.conversation(conversation_id, user.user_id)?))
}
