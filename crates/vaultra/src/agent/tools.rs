//! Context gathered for the assistant before each reply.
//!
//! Each source sits behind a narrow reader trait so the agent depends on read access
//! only. A failing reader degrades to an empty payload and the reply still goes out.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::ids::BusinessId;
use crate::metrics::{MetricSnapshot, MetricsService, ReadinessScore};
use crate::recommendations::{
    Recommendation, RecommendationFilter, RecommendationService, RecommendationStatus,
};
use crate::users::{Business, UsersService};

pub const TOP_RECOMMENDATIONS: usize = 5;

pub trait ReadinessReader: Send + Sync {
    fn latest_readiness(&self, business_id: BusinessId) -> Result<Option<ReadinessScore>, ApiError>;
}

pub trait MetricsReader: Send + Sync {
    fn latest_metrics(&self, business_id: BusinessId) -> Result<Option<MetricSnapshot>, ApiError>;
}

pub trait RecommendationReader: Send + Sync {
    /// Pending recommendations in list order, at most `limit`.
    fn pending_recommendations(
        &self,
        business_id: BusinessId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApiError>;
}

pub trait BusinessDirectory: Send + Sync {
    fn business(&self, business_id: BusinessId) -> Result<Option<Business>, ApiError>;
}

fn found<T>(result: Result<T, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

impl ReadinessReader for MetricsService {
    fn latest_readiness(&self, business_id: BusinessId) -> Result<Option<ReadinessScore>, ApiError> {
        found(self.latest_score(business_id))
    }
}

impl MetricsReader for MetricsService {
    fn latest_metrics(&self, business_id: BusinessId) -> Result<Option<MetricSnapshot>, ApiError> {
        found(self.latest_snapshot(business_id))
    }
}

impl RecommendationReader for RecommendationService {
    fn pending_recommendations(
        &self,
        business_id: BusinessId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApiError> {
        let filter = RecommendationFilter {
            status: Some(RecommendationStatus::Pending),
            priority: None,
        };
        let mut listed = self.list(business_id, filter)?.recommendations;
        listed.truncate(limit);
        Ok(listed)
    }
}

impl BusinessDirectory for UsersService {
    fn business(&self, business_id: BusinessId) -> Result<Option<Business>, ApiError> {
        self.find_business(business_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTool {
    Readiness,
    Recommendations,
    Metrics,
    Business,
}

impl ContextTool {
    pub fn name(self) -> &'static str {
        match self {
            ContextTool::Readiness => "readiness",
            ContextTool::Recommendations => "recommendations",
            ContextTool::Metrics => "metrics",
            ContextTool::Business => "business",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            ContextTool::Readiness => &["readiness", "score", "ready", "funding"],
            ContextTool::Recommendations => &["recommend", "improve", "fix", "action"],
            ContextTool::Metrics => &["metric", "revenue", "chargeback", "payout"],
            ContextTool::Business => &[],
        }
    }
}

/// Tools whose keywords appear in the message; business context is always last.
pub fn select_tools(message: &str) -> Vec<ContextTool> {
    let lowered = message.to_lowercase();
    let mut tools: Vec<ContextTool> = [
        ContextTool::Readiness,
        ContextTool::Recommendations,
        ContextTool::Metrics,
    ]
    .into_iter()
    .filter(|tool| tool.keywords().iter().any(|keyword| lowered.contains(keyword)))
    .collect();
    tools.push(ContextTool::Business);
    tools
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub tool: ContextTool,
    pub payload: Value,
}

#[derive(Clone)]
pub struct AgentTools {
    readiness: Arc<dyn ReadinessReader>,
    recommendations: Arc<dyn RecommendationReader>,
    metrics: Arc<dyn MetricsReader>,
    directory: Arc<dyn BusinessDirectory>,
}

impl AgentTools {
    pub fn new(
        readiness: Arc<dyn ReadinessReader>,
        recommendations: Arc<dyn RecommendationReader>,
        metrics: Arc<dyn MetricsReader>,
        directory: Arc<dyn BusinessDirectory>,
    ) -> Self {
        Self {
            readiness,
            recommendations,
            metrics,
            directory,
        }
    }

    pub fn gather(&self, business_id: BusinessId, tools: &[ContextTool]) -> Vec<ToolOutput> {
        tools
            .iter()
            .map(|&tool| {
                let payload = self.run(tool, business_id).unwrap_or_else(|err| {
                    warn!(%business_id, tool = tool.name(), error = %err, "context tool failed");
                    empty_payload(tool)
                });
                ToolOutput { tool, payload }
            })
            .collect()
    }

    fn run(&self, tool: ContextTool, business_id: BusinessId) -> Result<Value, ApiError> {
        let payload = match tool {
            ContextTool::Readiness => match self.readiness.latest_readiness(business_id)? {
                Some(score) => json!({
                    "score": score.score,
                    "tier": score.tier.as_str(),
                    "components": score.components,
                }),
                None => empty_payload(tool),
            },
            ContextTool::Recommendations => Value::Array(
                self.recommendations
                    .pending_recommendations(business_id, TOP_RECOMMENDATIONS)?
                    .into_iter()
                    .map(|recommendation| {
                        json!({
                            "title": recommendation.title,
                            "priority": recommendation.priority.as_str(),
                            "estimated_impact": recommendation.estimated_impact,
                        })
                    })
                    .collect(),
            ),
            ContextTool::Metrics => match self.metrics.latest_metrics(business_id)? {
                Some(snapshot) => json!({
                    "revenue_total": snapshot.revenue_total,
                    "revenue_volatility": snapshot.revenue_volatility,
                    "chargeback_ratio": snapshot.chargeback_ratio,
                    "payout_reliability": snapshot.payout_reliability,
                }),
                None => empty_payload(tool),
            },
            ContextTool::Business => match self.directory.business(business_id)? {
                Some(business) => json!({
                    "name": business.name,
                    "industry": business.industry,
                    "revenue_estimate": business.revenue_estimate,
                }),
                None => empty_payload(tool),
            },
        };
        Ok(payload)
    }
}

fn empty_payload(tool: ContextTool) -> Value {
    match tool {
        ContextTool::Recommendations => Value::Array(Vec::new()),
        _ => Value::Object(serde_json::Map::new()),
    }
}
