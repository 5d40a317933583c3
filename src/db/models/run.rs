//! Persisted collection runs.
//!
//! A run is keyed for resume purposes by `(site, directory, target_count)`; its per-character
//! progress lives in `character_counts`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    SampleLimitReached,
    /// The watched directory no longer matches the checkpoint; never resumed.
    Abandoned,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Interrupted => "Interrupted",
            RunStatus::SampleLimitReached => "SampleLimitReached",
            RunStatus::Abandoned => "Abandoned",
        }
    }

    /// Runs that stopped before coverage finished and may be picked up again.
    pub fn is_resumable(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Interrupted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRun {
    pub id: String,
    pub site: String,
    pub directory: String,
    pub target_count: u64,
    pub samples_collected: u64,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
