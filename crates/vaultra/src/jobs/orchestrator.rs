use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::schedule::JobKind;
use crate::error::ApiError;
use crate::integrations::{IntegrationAccount, IntegrationService, SyncError, SyncSummary};
use crate::metrics::{trailing_window, MetricSnapshot, MetricsService, ReadinessScore};
use crate::recommendations::{Recommendation, RecommendationService};

/// Failure of one stage for one account.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub job: JobKind,
    pub processed: usize,
    pub failed: usize,
    /// Accounts with nothing to do yet, such as scoring before any snapshot exists.
    pub skipped: usize,
}

impl TickReport {
    fn new(job: JobKind) -> Self {
        Self {
            job,
            processed: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

/// Everything one full pipeline pass produced for an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub sync: SyncSummary,
    pub snapshot: MetricSnapshot,
    pub score: Option<ReadinessScore>,
    pub recommendations: Vec<Recommendation>,
}

enum StageOutcome {
    Done,
    Skipped,
}

/// Drives sync, snapshot, scoring, and recommendation stages across active accounts.
pub struct Orchestrator {
    integrations: Arc<IntegrationService>,
    metrics: Arc<MetricsService>,
    recommendations: Arc<RecommendationService>,
    window_days: i64,
}

impl Orchestrator {
    pub fn new(
        integrations: Arc<IntegrationService>,
        metrics: Arc<MetricsService>,
        recommendations: Arc<RecommendationService>,
        window_days: i64,
    ) -> Self {
        Self {
            integrations,
            metrics,
            recommendations,
            window_days,
        }
    }

    /// Runs one stage for every active account. A failing account is logged and counted;
    /// the remaining accounts still run.
    pub async fn run_tick(&self, job: JobKind, now: DateTime<Utc>) -> Result<TickReport, ApiError> {
        let accounts = self.integrations.active_accounts()?;
        let mut report = TickReport::new(job);

        for account in &accounts {
            match self.run_stage(job, account, now).await {
                Ok(StageOutcome::Done) => report.processed += 1,
                Ok(StageOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    warn!(
                        job = job.as_str(),
                        business_id = %account.business_id,
                        error = %err,
                        "stage failed for account"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            job = job.as_str(),
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "tick finished"
        );
        Ok(report)
    }

    /// Sync, snapshot, score, and recommend for one account, each stage reading what the
    /// previous one wrote.
    pub async fn run_pipeline(
        &self,
        account: &IntegrationAccount,
        now: DateTime<Utc>,
    ) -> Result<PipelineReport, StageError> {
        let sync = self.integrations.sync_account(account, now).await?;
        let snapshot = self.build_snapshot(account, now)?;
        let score = self.metrics.compute_readiness(account.business_id, now)?;
        let recommendations = self.recommendations.generate(account.business_id, now)?;
        Ok(PipelineReport {
            sync,
            snapshot,
            score,
            recommendations,
        })
    }

    /// Starts one loop per job. Each loop sleeps until its next fire time and exits once
    /// `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        JobKind::ALL
            .into_iter()
            .map(|job| {
                let orchestrator = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { orchestrator.run_loop(job, shutdown).await })
            })
            .collect()
    }

    async fn run_loop(&self, job: JobKind, mut shutdown: watch::Receiver<bool>) {
        let schedule = job.schedule();
        info!(job = job.as_str(), "job loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            let now = Utc::now();
            let wait = (schedule.next_after(now) - now)
                .to_std()
                .unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(err) = self.run_tick(job, Utc::now()).await {
                        error!(job = job.as_str(), error = %err, "tick aborted");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(job = job.as_str(), "job loop stopped");
    }

    async fn run_stage(
        &self,
        job: JobKind,
        account: &IntegrationAccount,
        now: DateTime<Utc>,
    ) -> Result<StageOutcome, StageError> {
        match job {
            JobKind::Sync => {
                self.integrations.sync_account(account, now).await?;
            }
            JobKind::Metrics => {
                self.build_snapshot(account, now)?;
            }
            JobKind::Readiness => {
                if self
                    .metrics
                    .compute_readiness(account.business_id, now)?
                    .is_none()
                {
                    return Ok(StageOutcome::Skipped);
                }
            }
            JobKind::Recommendations => {
                self.recommendations.generate(account.business_id, now)?;
            }
        }
        Ok(StageOutcome::Done)
    }

    /// Completed days only, so the first tick of a day freezes a finished period.
    fn build_snapshot(
        &self,
        account: &IntegrationAccount,
        now: DateTime<Utc>,
    ) -> Result<MetricSnapshot, ApiError> {
        let (period_start, period_end) = trailing_window(now.date_naive(), self.window_days);
        self.metrics
            .compute_snapshot(account.business_id, period_start, period_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenSigner;
    use crate::ids::{BusinessId, UserId};
    use crate::integrations::tests::common::{charge, paid_payout, state_param, FakeProvider};
    use crate::metrics::{MetricsRepository, SnapshotBuilder};
    use crate::store::MemoryStore;
    use crate::users::{Business, BusinessRepository, Membership, MembershipRole};
    use chrono::{NaiveDate, TimeZone};

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        integrations: Arc<IntegrationService>,
        provider: Arc<FakeProvider>,
        store: Arc<MemoryStore>,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::default());
        let provider = Arc::new(FakeProvider::default());
        let integrations = Arc::new(IntegrationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            provider.clone(),
            Arc::new(TokenSigner::new("orchestrator-secret", 7)),
            "http://localhost/dashboard",
            30,
        ));
        let metrics = Arc::new(MetricsService::new(
            store.clone(),
            SnapshotBuilder::new(store.clone(), store.clone(), 1),
        ));
        let recommendations = Arc::new(RecommendationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            integrations.clone(),
            metrics,
            recommendations,
            30,
        ));
        Harness {
            orchestrator,
            integrations,
            provider,
            store,
        }
    }

    async fn connect(harness: &Harness, code: &str) -> BusinessId {
        let business_id = BusinessId::new();
        let owner = UserId::new();
        harness
            .store
            .insert_business(
                Business {
                    id: business_id,
                    name: format!("Business {code}"),
                    legal_entity: None,
                    industry: None,
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
        let url = harness
            .integrations
            .connect_url(business_id, owner, now())
            .expect("connect url");
        harness
            .integrations
            .complete_connect(code, &state_param(&url), now())
            .await
            .expect("connect");
        business_id
    }

    #[tokio::test]
    async fn failing_account_does_not_block_the_tick() {
        let harness = harness();
        connect(&harness, "healthy").await;
        connect(&harness, "down").await;
        harness
            .provider
            .with_charges("acct_healthy", vec![charge("ch_1", day(20), 4_000)]);
        harness.provider.fail_account("acct_down");

        let report = harness
            .orchestrator
            .run_tick(JobKind::Sync, now())
            .await
            .expect("tick");
        assert_eq!(
            report,
            TickReport {
                job: JobKind::Sync,
                processed: 1,
                failed: 1,
                skipped: 0,
            }
        );
    }

    #[tokio::test]
    async fn readiness_before_any_snapshot_is_skipped() {
        let harness = harness();
        connect(&harness, "fresh").await;

        let report = harness
            .orchestrator
            .run_tick(JobKind::Readiness, now())
            .await
            .expect("tick");
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 0);

        harness
            .orchestrator
            .run_tick(JobKind::Metrics, now())
            .await
            .expect("metrics tick");
        let report = harness
            .orchestrator
            .run_tick(JobKind::Readiness, now())
            .await
            .expect("tick");
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn pipeline_runs_every_stage_in_order() {
        let harness = harness();
        connect(&harness, "shop").await;
        let mut charges: Vec<_> = (1..=10)
            .map(|d| charge(&format!("ch_{d}"), day(d * 3), 10_000))
            .collect();
        charges[0].disputed = true;
        harness.provider.with_charges("acct_shop", charges);
        harness
            .provider
            .with_payouts("acct_shop", vec![paid_payout("po_1", day(15), day(15))]);

        let account = harness
            .integrations
            .active_accounts()
            .expect("accounts")
            .remove(0);
        let report = harness
            .orchestrator
            .run_pipeline(&account, now())
            .await
            .expect("pipeline");

        assert_eq!(report.sync.transactions, 10);
        assert_eq!(report.snapshot.period_end, day(30));
        assert_eq!(report.snapshot.period_start, day(1));
        assert_eq!(report.snapshot.transaction_count, 10);
        assert_eq!(report.snapshot.chargeback_ratio, Some(0.1));
        assert_eq!(
            report.score.as_ref().map(|score| score.business_id),
            Some(account.business_id)
        );
        assert!(report
            .recommendations
            .iter()
            .any(|recommendation| recommendation.title == "Reduce chargebacks"));
    }

    #[tokio::test]
    async fn steady_revenue_has_no_volatility() {
        let harness = harness();
        let business_id = connect(&harness, "steady").await;
        let charges = (1..=30)
            .map(|d| charge(&format!("ch_{d}"), day(d), 10_000))
            .collect();
        harness.provider.with_charges("acct_steady", charges);
        let midnight = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();

        for job in [JobKind::Sync, JobKind::Metrics] {
            let report = harness
                .orchestrator
                .run_tick(job, midnight)
                .await
                .expect("tick");
            assert_eq!(report.processed, 1, "{job}");
        }

        let snapshot = harness
            .store
            .latest_snapshot(business_id)
            .expect("repository")
            .expect("snapshot");
        assert_eq!((snapshot.period_start, snapshot.period_end), (day(1), day(30)));
        assert_eq!(snapshot.transaction_count, 30);
        assert_eq!(snapshot.revenue_volatility, Some(0.0));
    }

    #[tokio::test]
    async fn loops_stop_on_shutdown() {
        let harness = harness();
        let (stop, shutdown) = watch::channel(false);
        let handles = harness.orchestrator.clone().spawn(shutdown);
        assert_eq!(handles.len(), JobKind::ALL.len());

        stop.send(true).expect("loops listening");
        for handle in handles {
            tokio::time::timeout(std::time::Duration::from_secs(5), handle)
                .await
                .expect("loop exits promptly")
                .expect("loop did not panic");
        }
    }
}
