use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{
    Recommendation, RecommendationFilter, RecommendationList, RecommendationPriority,
    RecommendationStatus,
};
use super::repository::RecommendationRepository;
use super::rules;
use crate::error::ApiError;
use crate::ids::{BusinessId, RecommendationId, UserId};
use crate::metrics::MetricsRepository;
use crate::users::BusinessRepository;

/// Generation, listing, and status transitions for recommendations.
pub struct RecommendationService {
    recommendations: Arc<dyn RecommendationRepository>,
    metrics: Arc<dyn MetricsRepository>,
    memberships: Arc<dyn BusinessRepository>,
}

impl RecommendationService {
    pub fn new(
        recommendations: Arc<dyn RecommendationRepository>,
        metrics: Arc<dyn MetricsRepository>,
        memberships: Arc<dyn BusinessRepository>,
    ) -> Self {
        Self {
            recommendations,
            metrics,
            memberships,
        }
    }

    /// Evaluates the rules against the latest snapshot and score, persisting every hit.
    ///
    /// Repeated runs append again; earlier rows are left as they are.
    pub fn generate(
        &self,
        business_id: BusinessId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>, ApiError> {
        let snapshot = self.metrics.latest_snapshot(business_id)?;
        let score = self.metrics.latest_score(business_id)?;

        let generated = rules::evaluate(
            business_id,
            snapshot.as_ref(),
            score.map(|score| score.score),
            now,
        );
        if generated.is_empty() {
            return Ok(generated);
        }

        let stored = self.recommendations.insert_many(generated)?;
        info!(%business_id, count = stored.len(), "recommendations generated");
        Ok(stored)
    }

    /// Highest priority first, then newest first.
    pub fn list(
        &self,
        business_id: BusinessId,
        filter: RecommendationFilter,
    ) -> Result<RecommendationList, ApiError> {
        let mut recommendations = self.recommendations.list(business_id, filter)?;
        recommendations.reverse();
        recommendations.sort_by_key(|recommendation| {
            (
                Reverse(recommendation.priority),
                Reverse(recommendation.created_at),
            )
        });
        Ok(RecommendationList { recommendations })
    }

    /// Parses the raw `status` / `priority` query labels into a filter.
    pub fn parse_filter(
        status: Option<&str>,
        priority: Option<&str>,
    ) -> Result<RecommendationFilter, ApiError> {
        let status = status
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.parse::<RecommendationStatus>())
            .transpose()
            .map_err(|err| ApiError::validation(format!("Invalid status filter: {err}")))?;
        let priority = priority
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.parse::<RecommendationPriority>())
            .transpose()
            .map_err(|err| ApiError::validation(format!("Invalid priority filter: {err}")))?;
        Ok(RecommendationFilter { status, priority })
    }

    /// Moves a recommendation to `accepted` or `dismissed` on behalf of a member.
    pub fn update_status(
        &self,
        id: RecommendationId,
        actor: UserId,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, ApiError> {
        let status = status
            .parse::<RecommendationStatus>()
            .ok()
            .filter(|status| status.is_user_settable())
            .ok_or_else(|| ApiError::validation("Status must be accepted or dismissed"))?;

        let existing = self
            .recommendations
            .find(id)?
            .ok_or_else(|| ApiError::not_found("Recommendation not found"))?;
        if self
            .memberships
            .membership(actor, existing.business_id)?
            .is_none()
        {
            return Err(ApiError::forbidden("Access denied"));
        }

        let updated = self.recommendations.update_status(id, status, now)?;
        info!(
            recommendation_id = %id,
            status = status.as_str(),
            "recommendation status changed"
        );
        Ok(updated)
    }
}
