use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;

/// Wall-clock cadence, evaluated in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fires at every multiple of the interval counted from midnight.
    EveryMinutes(u32),
    Hourly { minute: u32 },
    Daily { hour: u32, minute: u32 },
}

impl Schedule {
    /// First fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = now
            - Duration::seconds(i64::from(now.num_seconds_from_midnight()))
            - Duration::nanoseconds(i64::from(now.nanosecond()));
        let elapsed_minutes = i64::from(now.hour()) * 60 + i64::from(now.minute());

        match *self {
            Schedule::EveryMinutes(interval) => {
                let interval = i64::from(interval.max(1));
                let slot = (elapsed_minutes / interval + 1) * interval;
                midnight + Duration::minutes(slot)
            }
            Schedule::Hourly { minute } => {
                let hour_start = midnight + Duration::hours(i64::from(now.hour()));
                let candidate = hour_start + Duration::minutes(i64::from(minute % 60));
                if candidate > now {
                    candidate
                } else {
                    candidate + Duration::hours(1)
                }
            }
            Schedule::Daily { hour, minute } => {
                let candidate = midnight
                    + Duration::hours(i64::from(hour % 24))
                    + Duration::minutes(i64::from(minute % 60));
                if candidate > now {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
        }
    }
}

/// The four pipeline stages the scheduler drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Sync,
    Metrics,
    Readiness,
    Recommendations,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Sync,
        JobKind::Metrics,
        JobKind::Readiness,
        JobKind::Recommendations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Sync => "sync",
            JobKind::Metrics => "metrics",
            JobKind::Readiness => "readiness",
            JobKind::Recommendations => "recommendations",
        }
    }

    pub fn schedule(self) -> Schedule {
        match self {
            JobKind::Sync => Schedule::EveryMinutes(15),
            JobKind::Metrics => Schedule::Hourly { minute: 0 },
            JobKind::Readiness => Schedule::Hourly { minute: 5 },
            JobKind::Recommendations => Schedule::Daily { hour: 2, minute: 0 },
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job '{0}'")]
pub struct UnknownJob(pub String);

impl FromStr for JobKind {
    type Err = UnknownJob;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|job| job.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| UnknownJob(value.to_string()))
    }
}
