use std::fs;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::db::{CollectionRun, Database, RunStatus};
use crate::error::{CollectError, CollectResult};
use crate::settings::CollectorSettings;

use super::coverage::{CharacterRecord, CoverageTracker};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Where an earlier, unfinished run left off.
#[derive(Debug, Clone)]
pub struct ResumePoint {
    pub samples_collected: u64,
    pub records: Vec<(char, CharacterRecord)>,
}

/// Writes run progress to the checkpoint store every `every` samples and on exit.
pub struct Checkpointer {
    db: Database,
    run: CollectionRun,
    every: u64,
    last_saved: u64,
}

/// Canonical form of the watched directory so `.` and its absolute path match on resume.
fn directory_key(settings: &CollectorSettings) -> String {
    fs::canonicalize(&settings.directory)
        .unwrap_or_else(|_| settings.directory.clone())
        .display()
        .to_string()
}

impl Checkpointer {
    /// Pick up the latest unfinished matching run when `resume` is enabled, otherwise
    /// register a fresh one.
    pub async fn start(
        db: Database,
        settings: &CollectorSettings,
    ) -> Result<(Self, Option<ResumePoint>)> {
        let directory = directory_key(settings);
        let now = Utc::now();

        if settings.resume {
            if let Some(mut run) = db
                .find_resumable_run(&settings.site, &directory, settings.target_count)
                .await?
            {
                let records = db.load_character_records(&run.id).await?;
                log_warn!(
                    "Resuming {} run {} at {} samples ({} characters seen)",
                    run.status.as_str(),
                    run.id,
                    run.samples_collected,
                    records.len()
                );
                db.mark_run_status(&run.id, RunStatus::Running, run.samples_collected, now)
                    .await?;
                run.status = RunStatus::Running;

                let resume = ResumePoint {
                    samples_collected: run.samples_collected,
                    records,
                };
                let checkpointer = Self {
                    db,
                    last_saved: run.samples_collected,
                    run,
                    every: settings.checkpoint_every,
                };
                return Ok((checkpointer, Some(resume)));
            }
        }

        let run = CollectionRun {
            id: Uuid::new_v4().to_string(),
            site: settings.site.clone(),
            directory,
            target_count: settings.target_count,
            samples_collected: 0,
            status: RunStatus::Running,
            started_at: now,
            updated_at: now,
        };
        db.insert_run(&run).await?;
        log_debug!("registered run {} in {}", run.id, db.path().display());

        Ok((
            Self {
                db,
                run,
                every: settings.checkpoint_every,
                last_saved: 0,
            },
            None,
        ))
    }

    pub fn run_id(&self) -> &str {
        &self.run.id
    }

    pub async fn maybe_save(&mut self, samples: u64, tracker: &CoverageTracker) -> CollectResult<()> {
        if samples.saturating_sub(self.last_saved) < self.every {
            return Ok(());
        }
        self.save(samples, tracker).await
    }

    pub async fn save(&mut self, samples: u64, tracker: &CoverageTracker) -> CollectResult<()> {
        let records = tracker
            .records()
            .iter()
            .map(|(ch, record)| (*ch, *record))
            .collect();

        self.db
            .save_checkpoint(&self.run.id, samples, records, Utc::now())
            .await
            .map_err(CollectError::Checkpoint)?;
        self.last_saved = samples;
        self.run.samples_collected = samples;
        log_debug!("checkpointed run {} at {samples} samples", self.run.id);
        Ok(())
    }

    /// Final save plus status transition.
    pub async fn finish(
        &mut self,
        status: RunStatus,
        samples: u64,
        tracker: &CoverageTracker,
    ) -> CollectResult<()> {
        self.save(samples, tracker).await?;
        self.db
            .mark_run_status(&self.run.id, status, samples, Utc::now())
            .await
            .map_err(CollectError::Checkpoint)?;
        self.run.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(watched: &tempfile::TempDir, every: u64) -> CollectorSettings {
        CollectorSettings {
            site: "http://localhost/form".into(),
            directory: watched.path().to_path_buf(),
            target_count: 2,
            checkpoint_every: every,
            ..CollectorSettings::default()
        }
    }

    #[tokio::test]
    async fn interrupted_run_is_resumed_with_its_counts() {
        let state = tempfile::tempdir().unwrap();
        let watched = tempfile::tempdir().unwrap();
        let db = Database::new(state.path().join("state.sqlite3")).unwrap();
        let settings = settings(&watched, 1);

        let (mut first, resume) = Checkpointer::start(db.clone(), &settings).await.unwrap();
        assert!(resume.is_none());

        let mut tracker = CoverageTracker::new(2, 62);
        tracker.observe("abcab");
        first
            .finish(RunStatus::Interrupted, 1, &tracker)
            .await
            .unwrap();

        let (second, resume) = Checkpointer::start(db.clone(), &settings).await.unwrap();
        let resume = resume.expect("interrupted run should resume");
        assert_eq!(second.run_id(), first.run_id());
        assert_eq!(resume.samples_collected, 1);

        let restored = CoverageTracker::restore(2, 62, resume.records);
        assert_eq!(restored.satisfied_count(), 2);
        assert_eq!(restored.record('c').unwrap().observed_count, 1);

        let run = db.get_run(second.run_id()).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn completed_runs_and_disabled_resume_start_fresh() {
        let state = tempfile::tempdir().unwrap();
        let watched = tempfile::tempdir().unwrap();
        let db = Database::new(state.path().join("state.sqlite3")).unwrap();
        let mut settings = settings(&watched, 1);

        let (mut first, _) = Checkpointer::start(db.clone(), &settings).await.unwrap();
        let tracker = CoverageTracker::new(2, 62);
        first.finish(RunStatus::Completed, 0, &tracker).await.unwrap();

        let (second, resume) = Checkpointer::start(db.clone(), &settings).await.unwrap();
        assert!(resume.is_none());
        assert_ne!(second.run_id(), first.run_id());

        settings.resume = false;
        let (third, resume) = Checkpointer::start(db, &settings).await.unwrap();
        assert!(resume.is_none());
        assert_ne!(third.run_id(), second.run_id());
    }

    #[tokio::test]
    async fn saves_only_every_n_samples() {
        let state = tempfile::tempdir().unwrap();
        let watched = tempfile::tempdir().unwrap();
        let db = Database::new(state.path().join("state.sqlite3")).unwrap();
        let (mut checkpointer, _) = Checkpointer::start(db.clone(), &settings(&watched, 3))
            .await
            .unwrap();

        let tracker = CoverageTracker::new(2, 62);
        for samples in 1..=4 {
            checkpointer.maybe_save(samples, &tracker).await.unwrap();
        }

        let run = db.get_run(checkpointer.run_id()).await.unwrap().unwrap();
        assert_eq!(run.samples_collected, 3);
    }
}
