use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::domain::MetricSnapshot;
use super::repository::MetricsRepository;
use crate::error::ApiError;
use crate::ids::{BusinessId, SnapshotId};
use crate::integrations::{ChargeStatus, LedgerPayout, LedgerRepository, LedgerTransaction, PayoutStatus};
use crate::store::RepositoryError;

const BUCKET_DAYS: i64 = 7;
const DEFAULT_CURRENCY: &str = "usd";

/// Ledger rows feeding one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInputs<'a> {
    pub transactions: &'a [LedgerTransaction],
    pub payouts: &'a [LedgerPayout],
    pub payout_grace_days: i64,
}

/// The `window_days` completed days before `today`, as an inclusive `(start, end)` pair.
///
/// `today` itself is excluded: its ledger is still filling and a snapshot is never rebuilt.
pub fn trailing_window(today: NaiveDate, window_days: i64) -> (NaiveDate, NaiveDate) {
    (
        today - Duration::days(window_days),
        today - Duration::days(1),
    )
}

/// Reduces the ledger rows of an inclusive `[period_start, period_end]` window into a snapshot.
///
/// Rows outside the window are ignored, so callers may pass a superset.
pub fn compute_snapshot(
    business_id: BusinessId,
    period_start: NaiveDate,
    period_end: NaiveDate,
    inputs: SnapshotInputs<'_>,
    now: DateTime<Utc>,
) -> MetricSnapshot {
    let window_days = (period_end - period_start).num_days() + 1;
    let in_window = |date: NaiveDate| date >= period_start && date <= period_end;

    let window: Vec<&LedgerTransaction> = inputs
        .transactions
        .iter()
        .filter(|tx| in_window(tx.created_at.date_naive()))
        .collect();
    let succeeded: Vec<&LedgerTransaction> = window
        .iter()
        .copied()
        .filter(|tx| tx.status == ChargeStatus::Succeeded)
        .collect();
    let failed_count = window
        .iter()
        .filter(|tx| tx.status == ChargeStatus::Failed)
        .count();

    let transaction_count = succeeded.len() as u64;
    let revenue_minor: i64 = succeeded.iter().map(|tx| tx.amount).sum();
    let recurring_minor: i64 = succeeded
        .iter()
        .filter(|tx| tx.recurring)
        .map(|tx| tx.amount)
        .sum();
    let chargeback_count = succeeded.iter().filter(|tx| tx.disputed).count() as u64;
    let refund_count = succeeded.iter().filter(|tx| tx.refunded).count() as u64;

    let revenue_total = to_major(revenue_minor);
    let ratio = |count: u64| (transaction_count > 0).then(|| count as f64 / transaction_count as f64);

    let weekly_minor = weekly_revenue(&succeeded, period_start, window_days);
    let revenue_volatility = if transaction_count > 0 {
        weekly_volatility(&weekly_minor, window_days)
    } else {
        None
    };

    let due: Vec<&LedgerPayout> = inputs
        .payouts
        .iter()
        .filter(|payout| in_window(payout.expected_arrival))
        .filter(|payout| payout.status != PayoutStatus::Canceled)
        .collect();
    let on_time = due
        .iter()
        .filter(|payout| is_on_time(payout, inputs.payout_grace_days))
        .count();
    let payout_reliability = (!due.is_empty()).then(|| on_time as f64 / due.len() as f64);

    let currency = succeeded
        .first()
        .map(|tx| tx.currency.clone())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let mut metrics = Map::new();
    metrics.insert("window_days".to_string(), json!(window_days));
    metrics.insert(
        "weekly_revenue".to_string(),
        Value::from(
            weekly_minor
                .iter()
                .map(|minor| to_major(*minor))
                .collect::<Vec<f64>>(),
        ),
    );
    metrics.insert("failed_count".to_string(), json!(failed_count));
    metrics.insert("payouts_due".to_string(), json!(due.len()));
    metrics.insert("payouts_on_time".to_string(), json!(on_time));
    metrics.insert("currency".to_string(), json!(currency));

    MetricSnapshot {
        id: SnapshotId::new(),
        business_id,
        period_start,
        period_end,
        revenue_total,
        revenue_volatility,
        chargeback_count,
        chargeback_ratio: ratio(chargeback_count),
        refund_count,
        refund_ratio: ratio(refund_count),
        payout_reliability,
        transaction_count,
        average_transaction_size: (transaction_count > 0)
            .then(|| revenue_total / transaction_count as f64),
        mrr: (transaction_count > 0 && window_days > 0)
            .then(|| to_major(recurring_minor) * 30.0 / window_days as f64),
        metrics,
        created_at: now,
    }
}

fn to_major(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// Revenue per consecutive 7-day bucket starting at `period_start`.
fn weekly_revenue(
    succeeded: &[&LedgerTransaction],
    period_start: NaiveDate,
    window_days: i64,
) -> Vec<i64> {
    if window_days <= 0 {
        return Vec::new();
    }
    let bucket_count = (window_days + BUCKET_DAYS - 1) / BUCKET_DAYS;
    let mut buckets = vec![0_i64; bucket_count as usize];
    for tx in succeeded {
        let offset = (tx.created_at.date_naive() - period_start).num_days();
        if (0..window_days).contains(&offset) {
            buckets[(offset / BUCKET_DAYS) as usize] += tx.amount;
        }
    }
    buckets
}

/// Population coefficient of variation of per-bucket daily averages.
fn weekly_volatility(weekly_minor: &[i64], window_days: i64) -> Option<f64> {
    if weekly_minor.len() < 2 {
        return None;
    }

    let daily_averages: Vec<f64> = weekly_minor
        .iter()
        .enumerate()
        .map(|(index, revenue)| {
            let days_before = index as i64 * BUCKET_DAYS;
            let days = (window_days - days_before).min(BUCKET_DAYS);
            *revenue as f64 / days as f64
        })
        .collect();

    let count = daily_averages.len() as f64;
    let mean = daily_averages.iter().sum::<f64>() / count;
    if mean <= 0.0 {
        return None;
    }
    let variance = daily_averages
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;
    Some(variance.sqrt() / mean)
}

fn is_on_time(payout: &LedgerPayout, grace_days: i64) -> bool {
    if payout.status != PayoutStatus::Paid {
        return false;
    }
    payout
        .settled_on
        .is_some_and(|settled| (settled - payout.expected_arrival).num_days() <= grace_days)
}

/// Builds and persists snapshots from the stored ledger.
pub struct SnapshotBuilder {
    ledger: Arc<dyn LedgerRepository>,
    snapshots: Arc<dyn MetricsRepository>,
    payout_grace_days: i64,
}

impl SnapshotBuilder {
    pub fn new(
        ledger: Arc<dyn LedgerRepository>,
        snapshots: Arc<dyn MetricsRepository>,
        payout_grace_days: i64,
    ) -> Self {
        Self {
            ledger,
            snapshots,
            payout_grace_days,
        }
    }

    /// Returns the snapshot for the exact period, computing it on first request.
    pub fn build(
        &self,
        business_id: BusinessId,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<MetricSnapshot, ApiError> {
        if period_start > period_end {
            return Err(ApiError::validation(
                "period_start must not be after period_end",
            ));
        }

        if let Some(existing) =
            self.snapshots
                .find_snapshot_for_period(business_id, period_start, period_end)?
        {
            debug!(%business_id, %period_start, %period_end, "snapshot already exists");
            return Ok(existing);
        }

        let transactions = self
            .ledger
            .transactions_between(business_id, period_start, period_end)?;
        let payouts = self
            .ledger
            .payouts_due_between(business_id, period_start, period_end)?;
        let snapshot = compute_snapshot(
            business_id,
            period_start,
            period_end,
            SnapshotInputs {
                transactions: &transactions,
                payouts: &payouts,
                payout_grace_days: self.payout_grace_days,
            },
            Utc::now(),
        );

        match self.snapshots.insert_snapshot(snapshot) {
            Ok(stored) => {
                info!(
                    %business_id,
                    %period_start,
                    %period_end,
                    transactions = stored.transaction_count,
                    "metric snapshot stored"
                );
                Ok(stored)
            }
            Err(RepositoryError::Conflict(_)) => self
                .snapshots
                .find_snapshot_for_period(business_id, period_start, period_end)?
                .ok_or_else(|| ApiError::internal("snapshot conflict without a stored row")),
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn charge(id: &str, offset: i64, amount: i64) -> LedgerTransaction {
        LedgerTransaction {
            external_id: id.to_string(),
            amount,
            currency: "usd".to_string(),
            created_at: day(offset).and_hms_opt(12, 0, 0).unwrap().and_utc(),
            status: ChargeStatus::Succeeded,
            refunded: false,
            disputed: false,
            recurring: false,
        }
    }

    fn payout(id: &str, expected: i64, settled: Option<i64>, status: PayoutStatus) -> LedgerPayout {
        LedgerPayout {
            external_id: id.to_string(),
            amount: 50_000,
            currency: "usd".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            expected_arrival: day(expected),
            settled_on: settled.map(day),
            status,
        }
    }

    fn compute(transactions: &[LedgerTransaction], payouts: &[LedgerPayout]) -> MetricSnapshot {
        compute_snapshot(
            BusinessId::new(),
            day(0),
            day(27),
            SnapshotInputs {
                transactions,
                payouts,
                payout_grace_days: 1,
            },
            Utc::now(),
        )
    }

    #[test]
    fn empty_window_has_no_ratios() {
        let snapshot = compute(&[], &[]);
        assert_eq!(snapshot.revenue_total, 0.0);
        assert_eq!(snapshot.transaction_count, 0);
        assert_eq!(snapshot.chargeback_ratio, None);
        assert_eq!(snapshot.refund_ratio, None);
        assert_eq!(snapshot.average_transaction_size, None);
        assert_eq!(snapshot.revenue_volatility, None);
        assert_eq!(snapshot.payout_reliability, None);
        assert_eq!(snapshot.mrr, None);
        assert_eq!(snapshot.metrics["window_days"], json!(28));
    }

    #[test]
    fn ratios_count_only_succeeded_charges() {
        let mut disputed = charge("ch_1", 0, 10_000);
        disputed.disputed = true;
        let mut refunded = charge("ch_2", 1, 5_000);
        refunded.refunded = true;
        let mut failed = charge("ch_3", 2, 99_999);
        failed.status = ChargeStatus::Failed;
        let plain = charge("ch_4", 3, 5_000);
        let outside = charge("ch_5", 40, 1_000_000);

        let snapshot = compute(&[disputed, refunded, failed, plain, outside], &[]);
        assert_eq!(snapshot.transaction_count, 3);
        assert_eq!(snapshot.revenue_total, 200.0);
        assert_eq!(snapshot.chargeback_count, 1);
        assert_eq!(snapshot.refund_count, 1);
        assert_eq!(snapshot.chargeback_ratio, Some(1.0 / 3.0));
        assert_eq!(snapshot.refund_ratio, Some(1.0 / 3.0));
        assert_eq!(snapshot.average_transaction_size, Some(200.0 / 3.0));
        assert_eq!(snapshot.metrics["failed_count"], json!(1));
    }

    #[test]
    fn steady_weeks_have_zero_volatility() {
        let transactions: Vec<LedgerTransaction> = (0..4)
            .map(|week| charge(&format!("ch_{week}"), week * 7, 70_000))
            .collect();
        let snapshot = compute(&transactions, &[]);
        assert_eq!(snapshot.revenue_volatility, Some(0.0));
        assert_eq!(
            snapshot.metrics["weekly_revenue"],
            json!([700.0, 700.0, 700.0, 700.0])
        );
    }

    #[test]
    fn uneven_weeks_use_population_cv() {
        // Daily averages 100 and 300 across two full weeks: mean 200, sigma 100.
        let transactions = vec![charge("ch_1", 0, 70_000), charge("ch_2", 7, 210_000)];
        let snapshot = compute_snapshot(
            BusinessId::new(),
            day(0),
            day(13),
            SnapshotInputs {
                transactions: &transactions,
                payouts: &[],
                payout_grace_days: 1,
            },
            Utc::now(),
        );
        let volatility = snapshot.revenue_volatility.expect("two buckets");
        assert!((volatility - 0.5).abs() < 1e-9);
    }

    #[test]
    fn partial_trailing_week_is_normalized_by_day_count() {
        // 8-day window: week one averages 100/day, the 1-day tail averages 100/day.
        let transactions = vec![charge("ch_1", 0, 70_000), charge("ch_2", 7, 10_000)];
        let snapshot = compute_snapshot(
            BusinessId::new(),
            day(0),
            day(7),
            SnapshotInputs {
                transactions: &transactions,
                payouts: &[],
                payout_grace_days: 1,
            },
            Utc::now(),
        );
        assert_eq!(snapshot.revenue_volatility, Some(0.0));
    }

    #[test]
    fn payout_grace_and_cancellations() {
        let payouts = vec![
            payout("po_1", 3, Some(3), PayoutStatus::Paid),
            payout("po_2", 5, Some(6), PayoutStatus::Paid),
            payout("po_3", 8, Some(12), PayoutStatus::Paid),
            payout("po_4", 10, None, PayoutStatus::Failed),
            payout("po_5", 12, None, PayoutStatus::Canceled),
            payout("po_6", 60, Some(60), PayoutStatus::Paid),
        ];
        let snapshot = compute(&[charge("ch_1", 0, 1_000)], &payouts);
        assert_eq!(snapshot.payout_reliability, Some(0.5));
        assert_eq!(snapshot.metrics["payouts_due"], json!(4));
        assert_eq!(snapshot.metrics["payouts_on_time"], json!(2));
    }

    #[test]
    fn mrr_scales_recurring_revenue_to_thirty_days() {
        let mut recurring = charge("ch_1", 0, 15_000);
        recurring.recurring = true;
        let transactions = vec![recurring, charge("ch_2", 1, 50_000)];
        let snapshot = compute_snapshot(
            BusinessId::new(),
            day(0),
            day(14),
            SnapshotInputs {
                transactions: &transactions,
                payouts: &[],
                payout_grace_days: 1,
            },
            Utc::now(),
        );
        assert_eq!(snapshot.mrr, Some(300.0));
    }

    #[test]
    fn rebuild_returns_existing_snapshot() {
        let store = Arc::new(MemoryStore::default());
        let business_id = BusinessId::new();
        store
            .upsert_transactions(business_id, vec![charge("ch_1", 2, 12_345)])
            .expect("seed ledger");
        let builder = SnapshotBuilder::new(store.clone(), store.clone(), 1);

        let first = builder.build(business_id, day(0), day(29)).expect("first build");
        store
            .upsert_transactions(business_id, vec![charge("ch_2", 3, 99_999)])
            .expect("late ledger row");
        let second = builder.build(business_id, day(0), day(29)).expect("second build");

        assert_eq!(first, second);
        assert_eq!(second.revenue_total, 123.45);
        assert_eq!(
            store
                .snapshot_history(business_id, None, None)
                .expect("history")
                .len(),
            1
        );
    }

    #[test]
    fn inverted_period_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let builder = SnapshotBuilder::new(store.clone(), store, 1);
        assert!(matches!(
            builder.build(BusinessId::new(), day(5), day(1)),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn trailing_window_covers_completed_days_only() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (start, end) = trailing_window(today, 30);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 30).unwrap());
        assert_eq!((end - start).num_days() + 1, 30);
    }
}
