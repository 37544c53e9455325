//! Per-source sync status.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state of a source's most recent sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    /// True once a pass has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }
}

/// Outcome of the latest sync pass for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub status: SyncStatus,
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Set only when `status` is `Failed`.
    pub last_error: Option<String>,
    pub components_count: usize,
    #[serde(
        rename = "durationMs",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub duration: Duration,
}

impl SourceStatus {
    pub fn idle() -> Self {
        Self {
            status: SyncStatus::Idle,
            last_sync_time: None,
            last_error: None,
            components_count: 0,
            duration: Duration::ZERO,
        }
    }

    /// A pass that has just begun; counters from the previous pass are kept.
    pub fn running(previous: &SourceStatus) -> Self {
        Self {
            status: SyncStatus::Running,
            last_error: None,
            ..previous.clone()
        }
    }

    pub fn completed(components_count: usize, duration: Duration) -> Self {
        Self {
            status: SyncStatus::Completed,
            last_sync_time: Some(Utc::now()),
            last_error: None,
            components_count,
            duration,
        }
    }

    pub fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: SyncStatus::Failed,
            last_sync_time: Some(Utc::now()),
            last_error: Some(error.into()),
            components_count: 0,
            duration,
        }
    }
}

impl Default for SourceStatus {
    fn default() -> Self {
        Self::idle()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
