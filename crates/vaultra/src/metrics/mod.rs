//! Metric snapshots and readiness scores.

pub mod domain;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod snapshot;

pub use domain::{
    HistoryRange, MetricSnapshot, ReadinessScore, ReadinessTier, ScoreHistory, SnapshotHistory,
};
pub use repository::MetricsRepository;
pub use router::metrics_router;
pub use scoring::{score_snapshot, tier_for, ScoreOutcome, TIER_THRESHOLDS};
pub use service::MetricsService;
pub use snapshot::{compute_snapshot, trailing_window, SnapshotBuilder, SnapshotInputs};
