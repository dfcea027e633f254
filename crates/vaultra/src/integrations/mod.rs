//! Payment-provider integration: Stripe Connect onboarding, webhook intake, and the
//! ledger the metrics pipeline reads from.

pub mod csv_import;
pub mod domain;
pub mod provider;
pub mod repository;
pub mod router;
pub mod service;
pub mod stripe;

#[cfg(test)]
pub(crate) mod tests;

pub use csv_import::{LedgerCsvImporter, LedgerImportError};
pub use domain::{
    ChargeStatus, ConnectionStatus, IntegrationAccount, IntegrationStatus, LedgerPayout,
    LedgerTransaction, PayoutStatus, Provider, ProviderEvent, SyncSummary,
};
pub use provider::{PaymentProviderClient, ProviderError, WebhookEvent};
pub use repository::{IntegrationRepository, LedgerRepository};
pub use router::integrations_router;
pub use service::{IntegrationService, SyncError, DEAUTHORIZED_EVENT};
pub use stripe::StripeClient;
