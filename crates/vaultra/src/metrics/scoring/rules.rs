use std::collections::BTreeMap;

use crate::metrics::domain::MetricSnapshot;

pub(crate) const BASELINE: i32 = 50;

/// One scoring clause: adjusts the running total from a single optional metric and
/// contributes a named component in `[0, 1]`.
pub(crate) struct ScoreRule {
    pub component: &'static str,
    pub metric: fn(&MetricSnapshot) -> Option<f64>,
    pub adjustment: fn(f64) -> i32,
    pub normalize: fn(f64) -> f64,
}

pub(crate) const RULES: [ScoreRule; 3] = [
    ScoreRule {
        component: "revenue_stability",
        metric: |snapshot| snapshot.revenue_volatility,
        adjustment: |volatility| {
            if volatility > 0.5 {
                -10
            } else if volatility < 0.2 {
                5
            } else {
                0
            }
        },
        normalize: |volatility| (1.0 - volatility).max(0.0),
    },
    ScoreRule {
        component: "risk_signals",
        metric: |snapshot| snapshot.chargeback_ratio,
        adjustment: |ratio| {
            if ratio > 0.02 {
                -15
            } else if ratio < 0.005 {
                5
            } else {
                0
            }
        },
        normalize: |ratio| (1.0 - ratio * 10.0).max(0.0),
    },
    ScoreRule {
        component: "payout_reliability",
        metric: |snapshot| snapshot.payout_reliability,
        adjustment: |reliability| {
            if reliability > 0.95 {
                10
            } else if reliability < 0.80 {
                -10
            } else {
                0
            }
        },
        normalize: |reliability| reliability,
    },
];

/// Applies every rule whose metric is present. Returns the unclamped total and components.
pub(crate) fn apply_rules(snapshot: &MetricSnapshot) -> (i32, BTreeMap<String, f64>) {
    let mut total = BASELINE;
    let mut components = BTreeMap::new();

    for rule in &RULES {
        let Some(value) = (rule.metric)(snapshot) else {
            continue;
        };
        total += (rule.adjustment)(value);
        components.insert(rule.component.to_string(), (rule.normalize)(value));
    }

    (total, components)
}
