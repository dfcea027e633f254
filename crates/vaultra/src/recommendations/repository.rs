use chrono::{DateTime, Utc};

use super::domain::{Recommendation, RecommendationFilter, RecommendationStatus};
use crate::ids::{BusinessId, RecommendationId};
use crate::store::RepositoryError;

/// Append-only recommendation storage; rows are never deleted.
pub trait RecommendationRepository: Send + Sync {
    fn insert_many(
        &self,
        recommendations: Vec<Recommendation>,
    ) -> Result<Vec<Recommendation>, RepositoryError>;
    fn find(&self, id: RecommendationId) -> Result<Option<Recommendation>, RepositoryError>;
    /// Changes only `status` and `updated_at`.
    fn update_status(
        &self,
        id: RecommendationId,
        status: RecommendationStatus,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, RepositoryError>;
    /// Matching rows in insertion order.
    fn list(
        &self,
        business_id: BusinessId,
        filter: RecommendationFilter,
    ) -> Result<Vec<Recommendation>, RepositoryError>;
}
