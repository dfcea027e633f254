use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::integrations::stripe::verify_signature;
use crate::integrations::{
    ChargeStatus, LedgerPayout, LedgerTransaction, PaymentProviderClient, PayoutStatus,
    ProviderError, WebhookEvent,
};

pub(crate) const WEBHOOK_SECRET: &str = "whsec_fake";

/// In-memory provider keyed by connected account id.
#[derive(Default)]
pub(crate) struct FakeProvider {
    charges: Mutex<HashMap<String, Vec<LedgerTransaction>>>,
    payouts: Mutex<HashMap<String, Vec<LedgerPayout>>>,
    failing: Mutex<HashSet<String>>,
    pub(crate) requested_since: Mutex<Vec<DateTime<Utc>>>,
}

impl FakeProvider {
    pub(crate) fn with_charges(&self, account: &str, charges: Vec<LedgerTransaction>) {
        self.charges
            .lock()
            .expect("fake provider lock")
            .insert(account.to_string(), charges);
    }

    pub(crate) fn with_payouts(&self, account: &str, payouts: Vec<LedgerPayout>) {
        self.payouts
            .lock()
            .expect("fake provider lock")
            .insert(account.to_string(), payouts);
    }

    pub(crate) fn fail_account(&self, account: &str) {
        self.failing
            .lock()
            .expect("fake provider lock")
            .insert(account.to_string());
    }

    fn check(&self, account: &str) -> Result<(), ProviderError> {
        if self.failing.lock().expect("fake provider lock").contains(account) {
            return Err(ProviderError::Api {
                status: 500,
                message: format!("{account} unavailable"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProviderClient for FakeProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        Ok(format!("https://connect.example.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        if code == "bad-code" {
            return Err(ProviderError::Authorization(
                "Authorization code expired".to_string(),
            ));
        }
        Ok(format!("acct_{code}"))
    }

    async fn list_charges(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, ProviderError> {
        self.check(account_id)?;
        self.requested_since
            .lock()
            .expect("fake provider lock")
            .push(since);
        Ok(self
            .charges
            .lock()
            .expect("fake provider lock")
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_payouts(
        &self,
        account_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<LedgerPayout>, ProviderError> {
        self.check(account_id)?;
        Ok(self
            .payouts
            .lock()
            .expect("fake provider lock")
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, ProviderError> {
        verify_signature(WEBHOOK_SECRET, payload, signature_header, now)?;
        let value: Value =
            serde_json::from_slice(payload).map_err(|err| ProviderError::Decode(err.to_string()))?;
        Ok(WebhookEvent {
            id: value["id"].as_str().unwrap_or_default().to_string(),
            event_type: value["type"].as_str().unwrap_or_default().to_string(),
            account: value["account"].as_str().map(str::to_string),
        })
    }
}

pub(crate) fn charge(id: &str, date: NaiveDate, amount: i64) -> LedgerTransaction {
    LedgerTransaction {
        external_id: id.to_string(),
        amount,
        currency: "usd".to_string(),
        created_at: date.and_hms_opt(15, 30, 0).expect("valid time").and_utc(),
        status: ChargeStatus::Succeeded,
        refunded: false,
        disputed: false,
        recurring: false,
    }
}

pub(crate) fn paid_payout(id: &str, expected: NaiveDate, settled: NaiveDate) -> LedgerPayout {
    LedgerPayout {
        external_id: id.to_string(),
        amount: 100_000,
        currency: "usd".to_string(),
        created_at: expected.and_hms_opt(0, 0, 0).expect("valid time").and_utc(),
        expected_arrival: expected,
        settled_on: Some(settled),
        status: PayoutStatus::Paid,
    }
}

/// The OAuth `state` query parameter of an authorization URL.
pub(crate) fn state_param(url: &str) -> String {
    url::Url::parse(url)
        .expect("authorize url")
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state param")
}
