//! Wiring from configuration to the shared API state and the job orchestrator.

use std::sync::Arc;

use crate::agent::{generator_from_config, AgentService, AgentTools, TextGenerator};
use crate::auth::{AuthService, TokenSigner};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::http::ApiState;
use crate::integrations::{IntegrationService, PaymentProviderClient, StripeClient};
use crate::jobs::Orchestrator;
use crate::metrics::{MetricsService, SnapshotBuilder};
use crate::recommendations::RecommendationService;
use crate::store::MemoryStore;
use crate::users::UsersService;

/// Every long-lived service, built once at startup.
#[derive(Clone)]
pub struct Application {
    pub state: ApiState,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<MemoryStore>,
}

impl Application {
    /// Builds the application with the real Stripe client and configured text generator.
    pub fn from_config(config: &AppConfig, store: Arc<MemoryStore>) -> Result<Self, AppError> {
        let provider: Arc<dyn PaymentProviderClient> = Arc::new(StripeClient::new(&config.stripe)?);
        let generator = generator_from_config(&config.llm)?;
        Ok(Self::assemble(config, store, provider, generator))
    }

    /// Builds the application around the given collaborators.
    pub fn assemble(
        config: &AppConfig,
        store: Arc<MemoryStore>,
        provider: Arc<dyn PaymentProviderClient>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let sessions = Arc::new(TokenSigner::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.token_ttl_days,
        ));
        let auth = Arc::new(AuthService::new(store.clone(), sessions.clone()));
        let users = Arc::new(UsersService::new(store.clone(), store.clone()));

        let builder = SnapshotBuilder::new(
            store.clone(),
            store.clone(),
            config.pipeline.payout_grace_days,
        );
        let metrics = Arc::new(MetricsService::new(store.clone(), builder));
        let recommendations = Arc::new(RecommendationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let integrations = Arc::new(IntegrationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            provider,
            sessions,
            config.stripe.dashboard_url.clone(),
            config.pipeline.window_days,
        ));

        let tools = AgentTools::new(
            metrics.clone(),
            recommendations.clone(),
            metrics.clone(),
            users.clone(),
        );
        let agent = Arc::new(AgentService::new(store.clone(), tools, generator));

        let orchestrator = Arc::new(Orchestrator::new(
            integrations.clone(),
            metrics.clone(),
            recommendations.clone(),
            config.pipeline.window_days,
        ));

        Self {
            state: ApiState {
                auth,
                users,
                metrics,
                recommendations,
                integrations,
                agent,
            },
            orchestrator,
            store,
        }
    }
}
