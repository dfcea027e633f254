use chrono::NaiveDate;

use super::domain::{MetricSnapshot, ReadinessScore};
use crate::ids::BusinessId;
use crate::store::RepositoryError;

/// Snapshot and score storage. Snapshots are unique per (business, period_start, period_end).
pub trait MetricsRepository: Send + Sync {
    fn insert_snapshot(&self, snapshot: MetricSnapshot) -> Result<MetricSnapshot, RepositoryError>;
    fn find_snapshot_for_period(
        &self,
        business_id: BusinessId,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Option<MetricSnapshot>, RepositoryError>;
    /// Greatest `period_end`, ties broken by the newest `created_at`.
    fn latest_snapshot(
        &self,
        business_id: BusinessId,
    ) -> Result<Option<MetricSnapshot>, RepositoryError>;
    /// Snapshots whose `period_end` lies within the optional bounds, newest period first.
    fn snapshot_history(
        &self,
        business_id: BusinessId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<MetricSnapshot>, RepositoryError>;
    fn insert_score(&self, score: ReadinessScore) -> Result<ReadinessScore, RepositoryError>;
    fn latest_score(
        &self,
        business_id: BusinessId,
    ) -> Result<Option<ReadinessScore>, RepositoryError>;
    /// Newest first, at most `limit` entries.
    fn score_history(
        &self,
        business_id: BusinessId,
        limit: usize,
    ) -> Result<Vec<ReadinessScore>, RepositoryError>;
}
