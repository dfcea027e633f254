use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::agent::{agent_router, AgentService};
use crate::auth::{auth_router, AuthService};
use crate::error::ApiError;
use crate::ids::{BusinessId, UserId};
use crate::integrations::{integrations_router, IntegrationService};
use crate::metrics::{metrics_router, MetricsService};
use crate::recommendations::{recommendations_router, RecommendationService};
use crate::users::{users_router, UsersService};

/// Shared handles every `/api/v1` handler extracts from.
#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UsersService>,
    pub metrics: Arc<MetricsService>,
    pub recommendations: Arc<RecommendationService>,
    pub integrations: Arc<IntegrationService>,
    pub agent: Arc<AgentService>,
}

/// Router builder mounting every module under `/api/v1`.
pub fn api_router(state: ApiState) -> Router {
    let v1 = Router::new()
        .merge(auth_router())
        .merge(users_router())
        .merge(metrics_router())
        .merge(recommendations_router())
        .merge(integrations_router())
        .merge(agent_router());

    Router::new().nest("/api/v1", v1).with_state(state)
}

/// Caller resolved from the `Authorization: Bearer` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub email: String,
}

#[axum::async_trait]
impl FromRequestParts<ApiState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

        let claims = state.auth.authenticate(token)?;
        Ok(CurrentUser {
            user_id: claims.user_id,
            email: claims.email,
        })
    }
}

/// `?business_id=` selector shared by the business-scoped readers.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BusinessQuery {
    pub business_id: BusinessId,
}

/// JSON body extractor whose rejections use the API error envelope.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}
