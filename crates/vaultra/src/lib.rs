//! Funding readiness pipeline for small businesses.
//!
//! Raw payment-provider ledgers are reduced into metric snapshots, scored into a bounded
//! readiness tier, and turned into advisory recommendations. The same services back the
//! authenticated HTTP API and the conversational assistant.

pub mod agent;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod ids;
pub mod integrations;
pub mod jobs;
pub mod metrics;
pub mod recommendations;
pub mod store;
pub mod telemetry;
pub mod users;
