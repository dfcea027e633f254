use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use vaultra::agent::{GenerationError, PromptMessage, TextGenerator};
use vaultra::app::Application;
use vaultra::config::{
    AppConfig, AppEnvironment, AuthConfig, LlmConfig, LlmProvider, PipelineConfig, ServerConfig,
    StripeConfig, TelemetryConfig,
};
use vaultra::ids::{BusinessId, UserId};
use vaultra::integrations::stripe::{signature_header, verify_signature};
use vaultra::integrations::{
    ChargeStatus, LedgerPayout, LedgerTransaction, PaymentProviderClient, PayoutStatus,
    ProviderError, WebhookEvent, DEAUTHORIZED_EVENT,
};
use vaultra::jobs::JobKind;
use vaultra::metrics::{tier_for, MetricsRepository};
use vaultra::store::MemoryStore;
use vaultra::users::{Business, BusinessRepository, Membership, MembershipRole};

const WEBHOOK_SECRET: &str = "whsec_pipeline";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
}

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

/// Two $50 charges every afternoon of March, two of them disputed, plus three paid payouts of
/// which the last settles six days late.
struct LedgerProvider;

impl LedgerProvider {
    fn charges() -> Vec<LedgerTransaction> {
        (0..62)
            .map(|index| LedgerTransaction {
                external_id: format!("ch_{index}"),
                amount: 5_000,
                currency: "usd".to_string(),
                created_at: Utc
                    .with_ymd_and_hms(2024, 3, 1 + index / 2, 15, 0, 0)
                    .unwrap(),
                status: ChargeStatus::Succeeded,
                refunded: false,
                disputed: index < 2,
                recurring: false,
            })
            .collect()
    }

    fn payouts() -> Vec<LedgerPayout> {
        [(5, 5), (12, 12), (19, 25)]
            .into_iter()
            .map(|(expected, settled)| LedgerPayout {
                external_id: format!("po_{expected}"),
                amount: 60_000,
                currency: "usd".to_string(),
                created_at: Utc.with_ymd_and_hms(2024, 3, expected - 2, 0, 0, 0).unwrap(),
                expected_arrival: march(expected),
                settled_on: Some(march(settled)),
                status: PayoutStatus::Paid,
            })
            .collect()
    }
}

#[async_trait]
impl PaymentProviderClient for LedgerProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        Ok(format!("https://connect.example.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        Ok(format!("acct_{code}"))
    }

    async fn list_charges(
        &self,
        _account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, ProviderError> {
        Ok(Self::charges()
            .into_iter()
            .filter(|charge| charge.created_at >= since)
            .collect())
    }

    async fn list_payouts(
        &self,
        _account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerPayout>, ProviderError> {
        Ok(Self::payouts()
            .into_iter()
            .filter(|payout| payout.created_at >= since)
            .collect())
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

struct SilentGenerator;

#[async_trait]
impl TextGenerator for SilentGenerator {
    async fn generate(&self, _messages: &[PromptMessage]) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured("OPENAI_API_KEY"))
    }
}

fn config() -> AppConfig {
    AppConfig {
        environment: AppEnvironment::Test,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        telemetry: TelemetryConfig {
            log_level: "info".to_string(),
            log_targets: false,
        },
        auth: AuthConfig {
            jwt_secret: "pipeline-secret".to_string(),
            token_ttl_days: 7,
        },
        stripe: StripeConfig {
            secret_key: String::new(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            connect_client_id: "ca_test".to_string(),
            redirect_uri: "http://localhost/callback".to_string(),
            dashboard_url: "http://localhost:4321/dashboard".to_string(),
            timeout: StdDuration::from_secs(5),
        },
        llm: LlmConfig {
            provider: LlmProvider::OpenAi,
            openai_api_key: String::new(),
            openai_model: "gpt-4o".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            timeout: StdDuration::from_secs(5),
        },
        pipeline: PipelineConfig {
            window_days: 30,
            payout_grace_days: 1,
            scheduler_enabled: false,
        },
    }
}

async fn connected_application() -> (Application, BusinessId) {
    let store = Arc::new(MemoryStore::default());
    let application = Application::assemble(
        &config(),
        store.clone(),
        Arc::new(LedgerProvider),
        Arc::new(SilentGenerator),
    );

    let business_id = BusinessId::new();
    let owner = UserId::new();
    store
        .insert_business(
            Business {
                id: business_id,
                name: "Harbor Coffee".to_string(),
                legal_entity: None,
                industry: Some("food".to_string()),
                revenue_estimate: None,
                founded_at: None,
                created_at: now(),
                updated_at: now(),
            },
            Membership {
                user_id: owner,
                business_id,
                role: MembershipRole::Owner,
                created_at: now(),
            },
        )
        .expect("seed business");

    let integrations = &application.state.integrations;
    let url = integrations
        .connect_url(business_id, owner, now())
        .expect("connect url");
    let state = url::Url::parse(&url)
        .expect("authorize url")
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state param");
    integrations
        .complete_connect("harbor", &state, now())
        .await
        .expect("connect");
    (application, business_id)
}

#[tokio::test]
async fn scheduled_jobs_carry_a_business_from_ledger_to_recommendations() {
    let (application, business_id) = connected_application().await;
    let orchestrator = &application.orchestrator;

    let early = orchestrator
        .run_tick(JobKind::Readiness, now())
        .await
        .expect("readiness tick");
    assert_eq!((early.processed, early.skipped), (0, 1));

    for job in JobKind::ALL {
        let report = orchestrator.run_tick(job, now()).await.expect("tick");
        assert_eq!((report.processed, report.failed), (1, 0), "{job}");
    }

    let snapshot = application
        .store
        .latest_snapshot(business_id)
        .expect("repository")
        .expect("snapshot");
    assert_eq!(snapshot.period_start, march(1));
    assert_eq!(snapshot.period_end, march(30));
    assert_eq!(snapshot.transaction_count, 60);
    assert!((snapshot.revenue_total - 3_000.0).abs() < 1e-9);
    assert!((snapshot.chargeback_ratio.expect("ratio") - 2.0 / 60.0).abs() < 1e-9);
    assert!(snapshot.revenue_volatility.expect("volatility") < 1e-9);
    assert!((snapshot.payout_reliability.expect("reliability") - 2.0 / 3.0).abs() < 1e-9);

    let score = application
        .state
        .metrics
        .latest_score(business_id)
        .expect("score");
    assert!(score.score <= 100);
    assert_eq!(score.tier, tier_for(score.score));

    let titles: Vec<String> = application
        .state
        .recommendations
        .list(business_id, Default::default())
        .expect("list")
        .recommendations
        .into_iter()
        .map(|recommendation| recommendation.title)
        .collect();
    assert!(titles.contains(&"Reduce chargebacks".to_string()));
    assert!(titles.contains(&"Improve payout timing".to_string()));
    assert!(!titles.contains(&"Stabilize revenue streams".to_string()));

    orchestrator
        .run_tick(JobKind::Metrics, now())
        .await
        .expect("second metrics tick");
    let again = application
        .store
        .latest_snapshot(business_id)
        .expect("repository")
        .expect("snapshot");
    assert_eq!(again.id, snapshot.id);
}

#[tokio::test]
async fn pipeline_runs_every_stage_in_order() {
    let (application, business_id) = connected_application().await;
    let account = application
        .state
        .integrations
        .active_accounts()
        .expect("accounts")
        .pop()
        .expect("one account");

    let report = application
        .orchestrator
        .run_pipeline(&account, now())
        .await
        .expect("pipeline");

    assert_eq!(report.sync.transactions, 62);
    assert_eq!(report.sync.payouts, 3);
    assert_eq!(report.snapshot.business_id, business_id);
    let score = report.score.expect("score after snapshot");
    assert_eq!(score.business_id, business_id);
    assert!(!report.recommendations.is_empty());

    let status = application
        .state
        .integrations
        .status(business_id)
        .expect("status");
    assert!(status.connected);
    assert_eq!(status.last_synced_at, Some(now()));
}

#[tokio::test]
async fn deauthorized_accounts_drop_out_of_the_schedule() {
    let (application, _) = connected_application().await;

    let payload = json!({
        "id": "evt_deauth",
        "type": DEAUTHORIZED_EVENT,
        "account": "acct_harbor",
    })
    .to_string();
    let header =
        signature_header(WEBHOOK_SECRET, now().timestamp(), payload.as_bytes()).expect("sign");
    let fresh = application
        .state
        .integrations
        .handle_webhook(payload.as_bytes(), Some(&header), now())
        .expect("webhook");
    assert!(fresh);

    let report = application
        .orchestrator
        .run_tick(JobKind::Sync, now())
        .await
        .expect("sync tick");
    assert_eq!(
        (report.processed, report.failed, report.skipped),
        (0, 0, 0)
    );
}
