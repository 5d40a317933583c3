use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_character, parse_datetime, parse_status, to_i64, to_u64},
    models::{CollectionRun, RunStatus},
};
use crate::sampling::CharacterRecord;

const RUN_COLUMNS: &str =
    "id, site, directory, target_count, samples_collected, status, started_at, updated_at";

fn row_to_run(row: &Row) -> Result<CollectionRun> {
    let target_count: i64 = row.get("target_count")?;
    let samples_collected: i64 = row.get("samples_collected")?;
    let status: String = row.get("status")?;
    let started_at: String = row.get("started_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(CollectionRun {
        id: row.get("id")?,
        site: row.get("site")?,
        directory: row.get("directory")?,
        target_count: to_u64(target_count, "target_count")?,
        samples_collected: to_u64(samples_collected, "samples_collected")?,
        status: parse_status(&status)?,
        started_at: parse_datetime(&started_at, "started_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_run(&self, run: &CollectionRun) -> Result<()> {
        let record = run.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO runs (id, site, directory, target_count, samples_collected, status, started_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.site,
                    record.directory,
                    to_i64(record.target_count)?,
                    to_i64(record.samples_collected)?,
                    record.status.as_str(),
                    record.started_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert run")?;
            Ok(())
        })
        .await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<CollectionRun>> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"))?;
            let mut rows = stmt.query(params![run_id])?;
            match rows.next()? {
                Some(row) => row_to_run(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    /// Most recently touched unfinished run for the same site, directory and target.
    pub async fn find_resumable_run(
        &self,
        site: &str,
        directory: &str,
        target_count: u64,
    ) -> Result<Option<CollectionRun>> {
        let site = site.to_string();
        let directory = directory.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM runs
                 WHERE site = ?1 AND directory = ?2 AND target_count = ?3
                 ORDER BY updated_at DESC"
            ))?;
            let mut rows = stmt.query(params![site, directory, to_i64(target_count)?])?;
            while let Some(row) = rows.next()? {
                let run = row_to_run(row)?;
                if run.status.is_resumable() {
                    return Ok(Some(run));
                }
            }
            Ok(None)
        })
        .await
    }

    /// Store progress and the full character table in one transaction.
    pub async fn save_checkpoint(
        &self,
        run_id: &str,
        samples_collected: u64,
        records: Vec<(char, CharacterRecord)>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE runs
                 SET samples_collected = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![to_i64(samples_collected)?, updated_at.to_rfc3339(), run_id],
            )
            .with_context(|| "failed to update run progress")?;

            {
                let mut upsert = tx.prepare(
                    "INSERT INTO character_counts (run_id, character, observed_count, satisfied)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (run_id, character)
                     DO UPDATE SET observed_count = excluded.observed_count,
                                   satisfied = excluded.satisfied",
                )?;
                for (ch, record) in &records {
                    upsert
                        .execute(params![
                            run_id,
                            ch.to_string(),
                            to_i64(record.observed_count)?,
                            record.satisfied,
                        ])
                        .with_context(|| format!("failed to store count for {ch:?}"))?;
                }
            }

            tx.commit().context("failed to commit checkpoint")?;
            Ok(())
        })
        .await
    }

    pub async fn mark_run_status(
        &self,
        run_id: &str,
        status: RunStatus,
        samples_collected: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE runs
                 SET status = ?1,
                     samples_collected = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    status.as_str(),
                    to_i64(samples_collected)?,
                    updated_at.to_rfc3339(),
                    run_id,
                ],
            )
            .with_context(|| "failed to update run status")?;
            Ok(())
        })
        .await
    }

    pub async fn load_character_records(&self, run_id: &str) -> Result<Vec<(char, CharacterRecord)>> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT character, observed_count, satisfied
                 FROM character_counts
                 WHERE run_id = ?1",
            )?;

            let mut rows = stmt.query(params![run_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let ch = parse_character(&row.get::<_, String>(0)?)?;
                records.push((
                    ch,
                    CharacterRecord {
                        observed_count: to_u64(row.get::<_, i64>(1)?, "observed_count")?,
                        satisfied: row.get::<_, bool>(2)?,
                    },
                ));
            }
            Ok(records)
        })
        .await
    }
}
