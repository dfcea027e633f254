use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use super::domain::{HistoryRange, MetricSnapshot, ReadinessScore, ScoreHistory, SnapshotHistory};
use super::repository::MetricsRepository;
use super::scoring::score_snapshot;
use super::snapshot::SnapshotBuilder;
use crate::error::ApiError;
use crate::ids::BusinessId;

pub const DEFAULT_HISTORY_LIMIT: usize = 30;
pub const MAX_HISTORY_LIMIT: usize = 365;

/// Snapshot and readiness reads plus the compute entry points the jobs drive.
pub struct MetricsService {
    repository: Arc<dyn MetricsRepository>,
    builder: SnapshotBuilder,
}

impl MetricsService {
    pub fn new(repository: Arc<dyn MetricsRepository>, builder: SnapshotBuilder) -> Self {
        Self {
            repository,
            builder,
        }
    }

    pub fn latest_snapshot(&self, business_id: BusinessId) -> Result<MetricSnapshot, ApiError> {
        self.repository
            .latest_snapshot(business_id)?
            .ok_or_else(|| ApiError::not_found("No metrics found"))
    }

    pub fn snapshot_history(
        &self,
        business_id: BusinessId,
        range: HistoryRange,
    ) -> Result<SnapshotHistory, ApiError> {
        if let (Some(start), Some(end)) = (range.start_date, range.end_date) {
            if start > end {
                return Err(ApiError::validation(
                    "start_date must not be after end_date",
                ));
            }
        }
        let metrics =
            self.repository
                .snapshot_history(business_id, range.start_date, range.end_date)?;
        Ok(SnapshotHistory { metrics })
    }

    pub fn latest_score(&self, business_id: BusinessId) -> Result<ReadinessScore, ApiError> {
        self.repository
            .latest_score(business_id)?
            .ok_or_else(|| ApiError::not_found("No readiness score found"))
    }

    pub fn score_history(
        &self,
        business_id: BusinessId,
        limit: Option<usize>,
    ) -> Result<ScoreHistory, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if limit == 0 {
            return Err(ApiError::validation("limit must be at least 1"));
        }
        let scores = self
            .repository
            .score_history(business_id, limit.min(MAX_HISTORY_LIMIT))?;
        Ok(ScoreHistory { scores })
    }

    /// Builds (or returns the existing) snapshot for the inclusive period.
    pub fn compute_snapshot(
        &self,
        business_id: BusinessId,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<MetricSnapshot, ApiError> {
        self.builder.build(business_id, period_start, period_end)
    }

    /// Scores the latest snapshot and stores a new score record.
    ///
    /// Returns `Ok(None)` when the business has no snapshot yet.
    pub fn compute_readiness(
        &self,
        business_id: BusinessId,
        now: DateTime<Utc>,
    ) -> Result<Option<ReadinessScore>, ApiError> {
        let Some(snapshot) = self.repository.latest_snapshot(business_id)? else {
            return Ok(None);
        };

        let record = score_snapshot(&snapshot).into_record(&snapshot, now);
        let stored = self.repository.insert_score(record)?;
        info!(
            %business_id,
            score = stored.score,
            tier = stored.tier.as_str(),
            "readiness score stored"
        );
        Ok(Some(stored))
    }
}
