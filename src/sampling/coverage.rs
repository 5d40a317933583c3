use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub const DEFAULT_EXPECTED_DISTINCT: usize = 62;

/// Per-character progress. `satisfied` flips to true once and never back; `observed_count`
/// keeps growing after that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRecord {
    pub satisfied: bool,
    pub observed_count: u64,
}

/// Counts how often each character has appeared across labels and how many distinct
/// characters have reached `target_count`.
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    target_count: u64,
    expected_distinct: usize,
    records: HashMap<char, CharacterRecord>,
    satisfied_count: usize,
}

impl CoverageTracker {
    pub fn new(target_count: u64, expected_distinct: usize) -> Self {
        Self {
            target_count,
            expected_distinct,
            records: HashMap::new(),
            satisfied_count: 0,
        }
    }

    /// Rebuild a tracker from checkpointed records. `satisfied_count` is recomputed, and any
    /// record already at the target is treated as satisfied.
    pub fn restore(
        target_count: u64,
        expected_distinct: usize,
        records: impl IntoIterator<Item = (char, CharacterRecord)>,
    ) -> Self {
        let records: HashMap<char, CharacterRecord> = records
            .into_iter()
            .map(|(ch, mut record)| {
                record.satisfied = record.satisfied || record.observed_count >= target_count;
                (ch, record)
            })
            .collect();
        let satisfied_count = records.values().filter(|record| record.satisfied).count();

        Self {
            target_count,
            expected_distinct,
            records,
            satisfied_count,
        }
    }

    /// Count every character of `label` in order and return the running number of distinct
    /// satisfied characters.
    pub fn observe(&mut self, label: &str) -> usize {
        for ch in label.chars() {
            let record = self.records.entry(ch).or_default();
            record.observed_count += 1;

            if !record.satisfied && record.observed_count >= self.target_count {
                record.satisfied = true;
                self.satisfied_count += 1;
                log_info!("finished {ch:?} with count {}", record.observed_count);
            }
        }

        log_debug!(
            "observed {label:?}: {}/{} characters satisfied, {} seen",
            self.satisfied_count,
            self.expected_distinct,
            self.records.len()
        );
        self.satisfied_count
    }

    pub fn is_complete(&self) -> bool {
        self.satisfied_count >= self.expected_distinct
    }

    pub fn satisfied_count(&self) -> usize {
        self.satisfied_count
    }

    pub fn target_count(&self) -> u64 {
        self.target_count
    }

    pub fn expected_distinct(&self) -> usize {
        self.expected_distinct
    }

    pub fn records(&self) -> &HashMap<char, CharacterRecord> {
        &self.records
    }

    pub fn record(&self, ch: char) -> Option<&CharacterRecord> {
        self.records.get(&ch)
    }
}
