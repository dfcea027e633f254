use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BusinessId, RecommendationId};

/// Ordered `Low < Medium < High` so readers can sort descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
}

impl RecommendationPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationPriority::Low => "low",
            RecommendationPriority::Medium => "medium",
            RecommendationPriority::High => "high",
        }
    }
}

impl FromStr for RecommendationPriority {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownLabel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Dismissed,
}

impl RecommendationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Dismissed => "dismissed",
        }
    }

    /// States a user may move a recommendation into.
    pub fn is_user_settable(self) -> bool {
        matches!(
            self,
            RecommendationStatus::Accepted | RecommendationStatus::Dismissed
        )
    }
}

impl FromStr for RecommendationStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "dismissed" => Ok(Self::Dismissed),
            _ => Err(UnknownLabel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Risk,
    CashFlow,
    General,
}

/// Advisory record. Only `status` and `updated_at` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub business_id: BusinessId,
    pub title: String,
    pub description: String,
    pub priority: RecommendationPriority,
    pub category: RecommendationCategory,
    pub status: RecommendationStatus,
    pub metric_refs: BTreeMap<String, f64>,
    pub estimated_impact: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecommendationFilter {
    pub status: Option<RecommendationStatus>,
    pub priority: Option<RecommendationPriority>,
}

impl RecommendationFilter {
    pub fn matches(&self, recommendation: &Recommendation) -> bool {
        self.status.map_or(true, |status| recommendation.status == status)
            && self
                .priority
                .map_or(true, |priority| recommendation.priority == priority)
    }
}

/// Body of `PATCH /recommendations/{id}`. The label is validated by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationList {
    pub recommendations: Vec<Recommendation>,
}
