use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{IntegrationAccount, LedgerPayout, LedgerTransaction, Provider, ProviderEvent};
use crate::ids::{BusinessId, IntegrationId};
use crate::store::RepositoryError;

/// Connected accounts and webhook bookkeeping.
pub trait IntegrationRepository: Send + Sync {
    /// Inserts or replaces the account for its (business, provider) pair.
    fn upsert_integration(
        &self,
        account: IntegrationAccount,
    ) -> Result<IntegrationAccount, RepositoryError>;
    fn find_integration(
        &self,
        business_id: BusinessId,
        provider: Provider,
    ) -> Result<Option<IntegrationAccount>, RepositoryError>;
    fn active_integrations(
        &self,
        provider: Provider,
    ) -> Result<Vec<IntegrationAccount>, RepositoryError>;
    /// Stamps a completed sync on the stored row, touching nothing else.
    ///
    /// Returns `None` when the row is gone, no longer active, or now points at a different
    /// external account.
    fn mark_synced(
        &self,
        id: IntegrationId,
        external_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<IntegrationAccount>, RepositoryError>;
    /// Flags every row for the external account as revoked. Returns the rows changed.
    fn revoke_integration(
        &self,
        provider: Provider,
        external_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<IntegrationAccount>, RepositoryError>;
    /// Stores the event unless its provider id was seen before. Returns whether it was new.
    fn record_event(&self, event: ProviderEvent) -> Result<bool, RepositoryError>;
}

/// Raw provider ledger, keyed by external id per business.
pub trait LedgerRepository: Send + Sync {
    fn upsert_transactions(
        &self,
        business_id: BusinessId,
        transactions: Vec<LedgerTransaction>,
    ) -> Result<usize, RepositoryError>;
    fn upsert_payouts(
        &self,
        business_id: BusinessId,
        payouts: Vec<LedgerPayout>,
    ) -> Result<usize, RepositoryError>;
    /// Charges created on a calendar day (UTC) within `start..=end`.
    fn transactions_between(
        &self,
        business_id: BusinessId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LedgerTransaction>, RepositoryError>;
    /// Payouts whose expected arrival falls within `start..=end`.
    fn payouts_due_between(
        &self,
        business_id: BusinessId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LedgerPayout>, RepositoryError>;
}
