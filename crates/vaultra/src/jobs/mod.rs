//! Scheduled pipeline: ledger sync, snapshots, readiness scoring, and recommendations.

pub mod orchestrator;
pub mod schedule;

pub use orchestrator::{Orchestrator, PipelineReport, StageError, TickReport};
pub use schedule::{JobKind, Schedule, UnknownJob};
