use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{BusinessId, ScoreId, SnapshotId};

/// Fixed set of financial health metrics for one business over one period.
///
/// Snapshots are never mutated. Ratios lie in `[0, 1]` and are `None` whenever their
/// denominator would be zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub id: SnapshotId,
    pub business_id: BusinessId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub revenue_total: f64,
    pub revenue_volatility: Option<f64>,
    pub chargeback_count: u64,
    pub chargeback_ratio: Option<f64>,
    pub refund_count: u64,
    pub refund_ratio: Option<f64>,
    pub payout_reliability: Option<f64>,
    pub transaction_count: u64,
    pub average_transaction_size: Option<f64>,
    pub mrr: Option<f64>,
    pub metrics: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessTier {
    HighlyAttractive,
    FundingReady,
    Improving,
    NotReady,
}

impl ReadinessTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadinessTier::HighlyAttractive => "highly_attractive",
            ReadinessTier::FundingReady => "funding_ready",
            ReadinessTier::Improving => "improving",
            ReadinessTier::NotReady => "not_ready",
        }
    }
}

/// Persisted readiness assessment. Scores accumulate; the newest one is current.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessScore {
    pub id: ScoreId,
    pub business_id: BusinessId,
    pub score: u8,
    pub tier: ReadinessTier,
    pub components: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

/// Optional inclusive bounds on `period_end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotHistory {
    pub metrics: Vec<MetricSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreHistory {
    pub scores: Vec<ReadinessScore>,
}
