//! Advisory recommendations derived from the latest snapshot and readiness score.

pub mod domain;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;

pub use domain::{
    Recommendation, RecommendationCategory, RecommendationFilter, RecommendationList,
    RecommendationPriority, RecommendationStatus, StatusUpdate,
};
pub use repository::RecommendationRepository;
pub use router::recommendations_router;
pub use service::RecommendationService;
