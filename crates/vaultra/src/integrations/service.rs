use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use tracing::{info, warn};
use url::Url;

use super::domain::{
    ConnectionStatus, IntegrationAccount, IntegrationStatus, Provider, ProviderEvent, SyncSummary,
};
use super::provider::{PaymentProviderClient, ProviderError};
use super::repository::{IntegrationRepository, LedgerRepository};
use crate::auth::ConnectStateSigner;
use crate::error::ApiError;
use crate::ids::{BusinessId, EventId, IntegrationId, UserId};
use crate::metrics::trailing_window;
use crate::store::RepositoryError;
use crate::users::BusinessRepository;

/// Event type sent when a connected account revokes access.
pub const DEAUTHORIZED_EVENT: &str = "account.application.deauthorized";

/// Failure while pulling an account's ledger.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Stripe Connect lifecycle: OAuth connect, status, webhooks, and ledger sync.
pub struct IntegrationService {
    integrations: Arc<dyn IntegrationRepository>,
    ledger: Arc<dyn LedgerRepository>,
    businesses: Arc<dyn BusinessRepository>,
    provider: Arc<dyn PaymentProviderClient>,
    states: Arc<dyn ConnectStateSigner>,
    dashboard_url: String,
    window_days: i64,
}

impl IntegrationService {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        ledger: Arc<dyn LedgerRepository>,
        businesses: Arc<dyn BusinessRepository>,
        provider: Arc<dyn PaymentProviderClient>,
        states: Arc<dyn ConnectStateSigner>,
        dashboard_url: impl Into<String>,
        window_days: i64,
    ) -> Self {
        Self {
            integrations,
            ledger,
            businesses,
            provider,
            states,
            dashboard_url: dashboard_url.into(),
            window_days,
        }
    }

    /// Authorization URL carrying a signed, short-lived `state` naming the business and the
    /// member who started the flow.
    pub fn connect_url(
        &self,
        business_id: BusinessId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        let state = self.states.sign_state(business_id, user_id, now)?;
        Ok(self.provider.authorize_url(&state)?)
    }

    /// Exchanges the callback code and activates the business's integration.
    ///
    /// Returns the dashboard URL the browser should land on.
    pub async fn complete_connect(
        &self,
        code: &str,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        let state = self.states.verify_state(state, now)?;
        let business_id = state.business_id;
        if code.trim().is_empty() {
            return Err(ApiError::validation("Authorization code is required"));
        }
        if self.businesses.find_business(business_id)?.is_none() {
            return Err(ApiError::not_found("Business not found"));
        }
        if self
            .businesses
            .membership(state.user_id, business_id)?
            .is_none()
        {
            return Err(ApiError::forbidden("Access denied"));
        }

        let external_id = self.provider.exchange_code(code).await?;
        let account = match self
            .integrations
            .find_integration(business_id, Provider::Stripe)?
        {
            Some(mut existing) => {
                existing.external_id = external_id;
                existing.status = IntegrationStatus::Active;
                existing.updated_at = now;
                existing
            }
            None => IntegrationAccount {
                id: IntegrationId::new(),
                business_id,
                provider: Provider::Stripe,
                external_id,
                status: IntegrationStatus::Active,
                last_synced_at: None,
                created_at: now,
                updated_at: now,
            },
        };
        let stored = self.integrations.upsert_integration(account)?;
        info!(%business_id, account = %stored.external_id, "stripe account connected");

        self.dashboard_redirect(business_id)
    }

    pub fn status(&self, business_id: BusinessId) -> Result<ConnectionStatus, ApiError> {
        let account = self
            .integrations
            .find_integration(business_id, Provider::Stripe)?;
        Ok(ConnectionStatus::from_account(account.as_ref()))
    }

    /// Verifies and records a webhook delivery. Returns `false` for a replayed event id.
    pub fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        let signature = signature.ok_or_else(|| ApiError::validation("Invalid webhook signature"))?;
        let event = self.provider.verify_webhook(payload, signature, now)?;

        let recorded = self.integrations.record_event(ProviderEvent {
            id: EventId::new(),
            provider: Provider::Stripe,
            provider_event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            account: event.account.clone(),
            received_at: now,
        })?;
        if !recorded {
            info!(event_id = %event.id, "duplicate webhook ignored");
            return Ok(false);
        }

        if event.event_type == DEAUTHORIZED_EVENT {
            if let Some(external_id) = event.account.as_deref() {
                self.revoke(external_id, now)?;
            }
        }
        Ok(true)
    }

    pub fn active_accounts(&self) -> Result<Vec<IntegrationAccount>, ApiError> {
        Ok(self.integrations.active_integrations(Provider::Stripe)?)
    }

    /// Pulls charges and payouts for one account and upserts them into the ledger.
    ///
    /// The fetch reaches back to the earlier of the last sync and midnight on the first day of
    /// the metrics window, so refund and dispute flags on recent charges are refreshed.
    pub async fn sync_account(
        &self,
        account: &IntegrationAccount,
        now: DateTime<Utc>,
    ) -> Result<SyncSummary, SyncError> {
        let (first_day, _) = trailing_window(now.date_naive(), self.window_days);
        let window_start = first_day.and_time(NaiveTime::MIN).and_utc();
        let since = account
            .last_synced_at
            .map_or(window_start, |last| last.min(window_start));

        let charges = self
            .provider
            .list_charges(&account.external_id, since)
            .await?;
        let payouts = self
            .provider
            .list_payouts(&account.external_id, since)
            .await?;

        let summary = SyncSummary {
            transactions: self.ledger.upsert_transactions(account.business_id, charges)?,
            payouts: self.ledger.upsert_payouts(account.business_id, payouts)?,
        };

        if self
            .integrations
            .mark_synced(account.id, &account.external_id, now)?
            .is_none()
        {
            warn!(
                business_id = %account.business_id,
                account = %account.external_id,
                "integration changed during sync; not stamping"
            );
        }

        info!(
            business_id = %account.business_id,
            transactions = summary.transactions,
            payouts = summary.payouts,
            "ledger synced"
        );
        Ok(summary)
    }

    fn revoke(&self, external_id: &str, now: DateTime<Utc>) -> Result<(), ApiError> {
        let revoked = self
            .integrations
            .revoke_integration(Provider::Stripe, external_id, now)?;
        if revoked.is_empty() {
            warn!(account = external_id, "deauthorization for unknown account");
        } else {
            info!(account = external_id, "stripe integration revoked");
        }
        Ok(())
    }

    fn dashboard_redirect(&self, business_id: BusinessId) -> Result<String, ApiError> {
        let mut url = Url::parse(&self.dashboard_url)
            .map_err(|err| ApiError::internal(format!("invalid dashboard url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("business_id", &business_id.to_string());
        Ok(url.to_string())
    }
}
