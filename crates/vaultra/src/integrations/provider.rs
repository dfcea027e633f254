use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{LedgerPayout, LedgerTransaction};
use crate::error::ApiError;

/// Typed failures from the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider is not configured: {0} is missing")]
    NotConfigured(&'static str),
    #[error("authorization rejected: {0}")]
    Authorization(String),
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected provider payload: {0}")]
    Decode(String),
    #[error("invalid webhook signature")]
    InvalidSignature,
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ProviderError::Decode(value.to_string())
        } else {
            ProviderError::Transport(value.to_string())
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::Authorization(message) => ApiError::Validation(message),
            ProviderError::InvalidSignature => ApiError::validation("Invalid webhook signature"),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Verified webhook envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    /// Connected account the event concerns, when the provider names one.
    pub account: Option<String>,
}

/// Payment-provider boundary: OAuth handshake, ledger reads, and webhook verification.
#[async_trait]
pub trait PaymentProviderClient: Send + Sync {
    /// URL the user is sent to for granting access; `state` comes back on the callback.
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError>;

    /// Exchanges an authorization code for the connected account id.
    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError>;

    async fn list_charges(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, ProviderError>;

    async fn list_payouts(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerPayout>, ProviderError>;

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, ProviderError>;
}
