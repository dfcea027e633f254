//! Stripe Connect adapter

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use url::Url;

use super::domain::{ChargeStatus, LedgerPayout, LedgerTransaction, PayoutStatus};
use super::provider::{PaymentProviderClient, ProviderError, WebhookEvent};
use crate::config::StripeConfig;

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";
const AUTHORIZE_URL: &str = "https://connect.stripe.com/oauth/authorize";
const TOKEN_URL: &str = "https://connect.stripe.com/oauth/token";
const PAGE_SIZE: &str = "100";
/// Maximum age, in seconds, of a signed webhook delivery.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe Connect client
pub struct StripeClient {
    http: Client,
    secret_key: String,
    webhook_secret: String,
    client_id: String,
    redirect_uri: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            client_id: config.connect_client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    fn secret_key(&self) -> Result<&str, ProviderError> {
        if self.secret_key.is_empty() {
            return Err(ProviderError::NotConfigured("STRIPE_SECRET_KEY"));
        }
        Ok(&self.secret_key)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        Ok(request.bearer_auth(self.secret_key()?))
    }

    /// Walks every page of a list endpoint for a connected account.
    async fn list_all<T>(
        &self,
        path: &str,
        account_id: &str,
        since: DateTime<Utc>,
        id_of: fn(&T) -> &str,
    ) -> Result<Vec<T>, ProviderError>
    where
        T: DeserializeOwned,
    {
        let mut items: Vec<T> = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![
                ("limit", PAGE_SIZE.to_string()),
                ("created[gte]", since.timestamp().to_string()),
            ];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let request = self
                .http
                .get(format!("{API_BASE}/{path}"))
                .header("Stripe-Account", account_id)
                .query(&query);
            let response = self.authorized(request)?.send().await?;
            let page: ListPage<T> = read_json(response).await?;

            let has_more = page.has_more;
            starting_after = page.data.last().map(|item| id_of(item).to_string());
            items.extend(page.data);

            if !has_more || starting_after.is_none() {
                break;
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl PaymentProviderClient for StripeClient {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        if self.client_id.is_empty() {
            return Err(ProviderError::NotConfigured("STRIPE_CONNECT_CLIENT_ID"));
        }
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("scope", "read_write"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|err| ProviderError::Decode(err.to_string()))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        let params = [("grant_type", "authorization_code"), ("code", code)];
        let request = self.http.post(TOKEN_URL).form(&params);
        let response = self.authorized(request)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Authorization(oauth_error_message(&body)));
        }

        let token: OAuthTokenResponse = response.json().await?;
        Ok(token.stripe_user_id)
    }

    async fn list_charges(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, ProviderError> {
        let charges: Vec<StripeCharge> = self
            .list_all("charges", account_id, since, StripeCharge::id)
            .await?;
        charges.into_iter().map(StripeCharge::into_ledger).collect()
    }

    async fn list_payouts(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerPayout>, ProviderError> {
        let payouts: Vec<StripePayout> = self
            .list_all("payouts", account_id, since, StripePayout::id)
            .await?;
        payouts.into_iter().map(StripePayout::into_ledger).collect()
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, ProviderError> {
        if self.webhook_secret.is_empty() {
            return Err(ProviderError::NotConfigured("STRIPE_WEBHOOK_SECRET"));
        }
        verify_signature(&self.webhook_secret, payload, signature_header, now)?;

        let event: StripeEventEnvelope =
            serde_json::from_slice(payload).map_err(|err| ProviderError::Decode(err.to_string()))?;
        Ok(WebhookEvent {
            id: event.id,
            event_type: event.event_type,
            account: event.account,
        })
    }
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against the raw body.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: DateTime<Utc>,
) -> Result<(), ProviderError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let raw_timestamp = timestamp.ok_or(ProviderError::InvalidSignature)?;
    let signed_at: i64 = raw_timestamp
        .parse()
        .map_err(|_| ProviderError::InvalidSignature)?;
    if (now.timestamp() - signed_at).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(ProviderError::InvalidSignature);
    }

    let expected = signature_bytes(secret, raw_timestamp, payload)?;
    let matched = candidates
        .iter()
        .filter_map(|candidate| hex::decode(candidate).ok())
        .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));

    if matched {
        Ok(())
    } else {
        Err(ProviderError::InvalidSignature)
    }
}

/// Builds the header value Stripe would send for `payload` signed at `timestamp`.
pub fn signature_header(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, ProviderError> {
    let raw_timestamp = timestamp.to_string();
    let signature = signature_bytes(secret, &raw_timestamp, payload)?;
    Ok(format!("t={raw_timestamp},v1={}", hex::encode(signature)))
}

fn signature_bytes(secret: &str, timestamp: &str, payload: &[u8]) -> Result<Vec<u8>, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ProviderError::InvalidSignature)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or(body);
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

fn oauth_error_message(body: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(parsed) => parsed.error_description.unwrap_or(parsed.error),
        Err(_) => "authorization code exchange failed".to_string(),
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ProviderError::Decode(format!("timestamp {secs} out of range")))
}

fn date(secs: i64) -> Result<NaiveDate, ProviderError> {
    timestamp(secs).map(|value| value.date_naive())
}

#[derive(Deserialize)]
struct ListPage<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    stripe_user_id: String,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct StripeEventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    account: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCharge {
    id: String,
    amount: i64,
    currency: String,
    created: i64,
    status: String,
    #[serde(default)]
    refunded: bool,
    #[serde(default)]
    disputed: bool,
    #[serde(default)]
    invoice: Option<serde_json::Value>,
}

impl StripeCharge {
    fn id(&self) -> &str {
        &self.id
    }

    fn into_ledger(self) -> Result<LedgerTransaction, ProviderError> {
        let status = match self.status.as_str() {
            "succeeded" => ChargeStatus::Succeeded,
            "failed" => ChargeStatus::Failed,
            _ => ChargeStatus::Pending,
        };
        Ok(LedgerTransaction {
            created_at: timestamp(self.created)?,
            external_id: self.id,
            amount: self.amount,
            currency: self.currency,
            status,
            refunded: self.refunded,
            disputed: self.disputed,
            recurring: self.invoice.is_some(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripePayout {
    id: String,
    amount: i64,
    currency: String,
    created: i64,
    arrival_date: i64,
    status: String,
}

impl StripePayout {
    fn id(&self) -> &str {
        &self.id
    }

    /// Stripe only reports the arrival date, so a `paid` payout is taken as settled on it.
    fn into_ledger(self) -> Result<LedgerPayout, ProviderError> {
        let status = match self.status.as_str() {
            "paid" => PayoutStatus::Paid,
            "in_transit" => PayoutStatus::InTransit,
            "failed" => PayoutStatus::Failed,
            "canceled" => PayoutStatus::Canceled,
            _ => PayoutStatus::Pending,
        };
        let expected_arrival = date(self.arrival_date)?;
        Ok(LedgerPayout {
            created_at: timestamp(self.created)?,
            external_id: self.id,
            amount: self.amount,
            currency: self.currency,
            expected_arrival,
            settled_on: (status == PayoutStatus::Paid).then_some(expected_arrival),
            status,
        })
    }
}
