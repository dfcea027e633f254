use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{
    Recommendation, RecommendationCategory, RecommendationPriority, RecommendationStatus,
};
use crate::ids::{BusinessId, RecommendationId};
use crate::metrics::MetricSnapshot;

/// Readiness score below which the general advice is issued.
pub const CORE_METRICS_THRESHOLD: u8 = 50;

struct Advice {
    title: &'static str,
    description: &'static str,
    priority: RecommendationPriority,
    category: RecommendationCategory,
    estimated_impact: &'static str,
}

/// Snapshot-driven rule: fires when `triggers` holds for the present metric value.
struct MetricRule {
    metric: &'static str,
    value: fn(&MetricSnapshot) -> Option<f64>,
    triggers: fn(f64) -> bool,
    advice: Advice,
}

const METRIC_RULES: [MetricRule; 3] = [
    MetricRule {
        metric: "chargeback_ratio",
        value: |snapshot| snapshot.chargeback_ratio,
        triggers: |ratio| ratio > 0.02,
        advice: Advice {
            title: "Reduce chargebacks",
            description: "Your chargeback ratio is above 2%. Consider improving dispute descriptors and customer communication.",
            priority: RecommendationPriority::High,
            category: RecommendationCategory::Risk,
            estimated_impact: "+10-15 points",
        },
    },
    MetricRule {
        metric: "revenue_volatility",
        value: |snapshot| snapshot.revenue_volatility,
        triggers: |volatility| volatility > 0.5,
        advice: Advice {
            title: "Stabilize revenue streams",
            description: "High revenue volatility detected. Diversifying revenue sources can improve your score.",
            priority: RecommendationPriority::Medium,
            category: RecommendationCategory::CashFlow,
            estimated_impact: "+5-10 points",
        },
    },
    MetricRule {
        metric: "payout_reliability",
        value: |snapshot| snapshot.payout_reliability,
        triggers: |reliability| reliability < 0.80,
        advice: Advice {
            title: "Improve payout timing",
            description: "Less than 80% of payouts are completing on time. Review your payment provider payout settings.",
            priority: RecommendationPriority::High,
            category: RecommendationCategory::CashFlow,
            estimated_impact: "+10 points",
        },
    },
];

const CORE_METRICS: Advice = Advice {
    title: "Focus on core metrics",
    description: "Your readiness score is below 50. Focus on reducing chargebacks and stabilizing revenue.",
    priority: RecommendationPriority::Medium,
    category: RecommendationCategory::General,
    estimated_impact: "Varies",
};

/// Runs every rule against whatever inputs exist. Either input may be absent.
pub fn evaluate(
    business_id: BusinessId,
    snapshot: Option<&MetricSnapshot>,
    score: Option<u8>,
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some(snapshot) = snapshot {
        for rule in &METRIC_RULES {
            let Some(value) = (rule.value)(snapshot) else {
                continue;
            };
            if (rule.triggers)(value) {
                let refs = BTreeMap::from([(rule.metric.to_string(), value)]);
                recommendations.push(build(business_id, &rule.advice, refs, now));
            }
        }
    }

    if let Some(score) = score.filter(|score| *score < CORE_METRICS_THRESHOLD) {
        let refs = BTreeMap::from([("readiness_score".to_string(), f64::from(score))]);
        recommendations.push(build(business_id, &CORE_METRICS, refs, now));
    }

    recommendations
}

fn build(
    business_id: BusinessId,
    advice: &Advice,
    metric_refs: BTreeMap<String, f64>,
    now: DateTime<Utc>,
) -> Recommendation {
    Recommendation {
        id: RecommendationId::new(),
        business_id,
        title: advice.title.to_string(),
        description: advice.description.to_string(),
        priority: advice.priority,
        category: advice.category,
        status: RecommendationStatus::Pending,
        metric_refs,
        estimated_impact: advice.estimated_impact.to_string(),
        created_at: now,
        updated_at: now,
    }
}
