use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::sampling::CharacterRecord;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub character: char,
    pub observed_count: u64,
}

/// Final frequency table: letters ascending, then digits ascending, then the sample total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub rows: Vec<ReportRow>,
    pub total_samples: u64,
}

pub fn build_report(records: &HashMap<char, CharacterRecord>, total_samples: u64) -> CoverageReport {
    let mut alphabetic = Vec::new();
    let mut numeric = Vec::new();

    for (&character, record) in records {
        let row = ReportRow {
            character,
            observed_count: record.observed_count,
        };
        if character.is_alphabetic() {
            alphabetic.push(row);
        } else if character.is_numeric() {
            numeric.push(row);
        } else {
            log_warn!(
                "dropping {character:?} ({} occurrences) from the report: not alphanumeric",
                record.observed_count
            );
        }
    }

    alphabetic.sort_by_key(|row| row.character);
    numeric.sort_by_key(|row| row.character);
    alphabetic.extend(numeric);

    CoverageReport {
        rows: alphabetic,
        total_samples,
    }
}

impl CoverageReport {
    pub fn pairs(&self) -> Vec<(char, u64)> {
        self.rows
            .iter()
            .map(|row| (row.character, row.observed_count))
            .collect()
    }

    /// One `character,count` record per row, then a one-field record with the sample total.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .terminator(csv::Terminator::CRLF)
            .from_writer(writer);

        for row in &self.rows {
            csv.write_record([row.character.to_string(), row.observed_count.to_string()])?;
        }
        csv.write_record([self.total_samples.to_string()])?;
        csv.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        self.write_to(file)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        log_info!(
            "wrote {} characters and {} samples to {}",
            self.rows.len(),
            self.total_samples,
            path.display()
        );
        Ok(())
    }
}
