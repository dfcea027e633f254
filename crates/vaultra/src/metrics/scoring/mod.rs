//! Deterministic readiness scoring: baseline plus independent metric clauses, clamped to
//! `[0, 100]` and bucketed into a tier.

mod rules;
mod tiers;

pub use tiers::{tier_for, TIER_THRESHOLDS};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{MetricSnapshot, ReadinessScore, ReadinessTier};
use crate::ids::ScoreId;

/// Pure scoring result before it is stamped and persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreOutcome {
    pub score: u8,
    pub tier: ReadinessTier,
    pub components: BTreeMap<String, f64>,
}

impl ScoreOutcome {
    pub fn into_record(self, snapshot: &MetricSnapshot, now: DateTime<Utc>) -> ReadinessScore {
        ReadinessScore {
            id: ScoreId::new(),
            business_id: snapshot.business_id,
            score: self.score,
            tier: self.tier,
            components: self.components,
            created_at: now,
        }
    }
}

/// Scores a snapshot. Total over every combination of present and absent metrics.
pub fn score_snapshot(snapshot: &MetricSnapshot) -> ScoreOutcome {
    let (raw, components) = rules::apply_rules(snapshot);
    let score = raw.clamp(0, 100) as u8;
    ScoreOutcome {
        score,
        tier: tier_for(score),
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{BusinessId, SnapshotId};
    use chrono::NaiveDate;
    use serde_json::Map;

    fn snapshot(
        volatility: Option<f64>,
        chargeback: Option<f64>,
        payout: Option<f64>,
    ) -> MetricSnapshot {
        MetricSnapshot {
            id: SnapshotId::new(),
            business_id: BusinessId::new(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            revenue_total: 10_000.0,
            revenue_volatility: volatility,
            chargeback_count: 0,
            chargeback_ratio: chargeback,
            refund_count: 0,
            refund_ratio: None,
            payout_reliability: payout,
            transaction_count: 100,
            average_transaction_size: Some(100.0),
            mrr: None,
            metrics: Map::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn mixed_signals_land_on_baseline() {
        let outcome = score_snapshot(&snapshot(Some(0.1), Some(0.025), Some(0.99)));
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.tier, ReadinessTier::Improving);
        assert!((outcome.components["revenue_stability"] - 0.9).abs() < 1e-9);
        assert!((outcome.components["risk_signals"] - 0.75).abs() < 1e-9);
        assert_eq!(outcome.components["payout_reliability"], 0.99);
    }

    #[test]
    fn empty_snapshot_scores_baseline_without_components() {
        let outcome = score_snapshot(&snapshot(None, None, None));
        assert_eq!(outcome.score, 50);
        assert!(outcome.components.is_empty());
    }

    #[test]
    fn best_and_worst_cases_stay_in_range() {
        let best = score_snapshot(&snapshot(Some(0.0), Some(0.0), Some(1.0)));
        assert_eq!(best.score, 70);
        assert_eq!(best.tier, ReadinessTier::Improving);

        let worst = score_snapshot(&snapshot(Some(3.0), Some(0.5), Some(0.0)));
        assert_eq!(worst.score, 15);
        assert_eq!(worst.tier, ReadinessTier::NotReady);
        assert_eq!(worst.components["revenue_stability"], 0.0);
        assert_eq!(worst.components["risk_signals"], 0.0);
    }

    #[test]
    fn every_presence_combination_is_bounded() {
        let volatility = [None, Some(0.0), Some(0.3), Some(0.9)];
        let chargeback = [None, Some(0.0), Some(0.01), Some(0.2)];
        let payout = [None, Some(0.5), Some(0.9), Some(1.0)];
        for v in volatility {
            for c in chargeback {
                for p in payout {
                    let outcome = score_snapshot(&snapshot(v, c, p));
                    assert!(outcome.score <= 100);
                    assert_eq!(outcome.tier, tier_for(outcome.score));
                    assert!(outcome
                        .components
                        .values()
                        .all(|value| (0.0..=1.0).contains(value)));
                }
            }
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let input = snapshot(Some(0.35), Some(0.004), Some(0.85));
        assert_eq!(score_snapshot(&input), score_snapshot(&input));
    }

    #[test]
    fn record_carries_business_and_outcome() {
        let input = snapshot(Some(0.1), None, None);
        let now = Utc::now();
        let record = score_snapshot(&input).into_record(&input, now);
        assert_eq!(record.business_id, input.business_id);
        assert_eq!(record.score, 55);
        assert_eq!(record.created_at, now);
    }
}
