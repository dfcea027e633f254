use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BusinessId, EventId, IntegrationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Stripe,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Active,
    Inactive,
    Revoked,
}

/// Connected provider account; one per (business, provider).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationAccount {
    pub id: IntegrationId,
    pub business_id: BusinessId,
    pub provider: Provider,
    pub external_id: String,
    pub status: IntegrationStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntegrationAccount {
    pub fn is_active(&self) -> bool {
        self.status == IntegrationStatus::Active
    }
}

/// Webhook delivery record. The provider's event id is unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderEvent {
    pub id: EventId,
    pub provider: Provider,
    pub provider_event_id: String,
    pub event_type: String,
    pub account: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Pending,
    Failed,
}

/// Raw charge as synced from the provider. Amounts are in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub external_id: String,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub status: ChargeStatus,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub disputed: bool,
    #[serde(default)]
    pub recurring: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Paid,
    Pending,
    InTransit,
    Failed,
    Canceled,
}

/// Raw payout as synced from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPayout {
    pub external_id: String,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub expected_arrival: NaiveDate,
    pub settled_on: Option<NaiveDate>,
    pub status: PayoutStatus,
}

/// Response body of `GET /integrations/stripe/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    pub fn from_account(account: Option<&IntegrationAccount>) -> Self {
        match account {
            Some(account) if account.is_active() => Self {
                connected: true,
                account_id: Some(account.external_id.clone()),
                last_synced_at: account.last_synced_at,
            },
            _ => Self {
                connected: false,
                account_id: None,
                last_synced_at: None,
            },
        }
    }
}

/// Result of one ledger sync for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub transactions: usize,
    pub payouts: usize,
}
