use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserLauncher, BrowserSession, RetryPolicy};
use crate::db::RunStatus;
use crate::error::{CollectError, CollectResult, DriverError};
use crate::settings::CollectorSettings;

use super::checkpoint::{Checkpointer, ResumePoint};
use super::coverage::CoverageTracker;
use super::label::extract_label;
use super::watcher::DirectoryWatcher;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionPhase {
    Init,
    Collecting,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Every expected character reached the target count.
    Complete,
    /// `max_samples` ran out first.
    SampleLimitReached,
}

impl CollectionOutcome {
    fn run_status(self) -> RunStatus {
        match self {
            CollectionOutcome::Complete => RunStatus::Completed,
            CollectionOutcome::SampleLimitReached => RunStatus::SampleLimitReached,
        }
    }
}

#[derive(Debug)]
pub struct CollectionSummary {
    pub samples_collected: u64,
    pub outcome: CollectionOutcome,
    pub tracker: CoverageTracker,
    pub run_id: Option<String>,
}

/// Drives the browser and the directory watcher in lockstep: one refresh, one new sample.
pub struct CollectionDriver<'a> {
    launcher: &'a dyn BrowserLauncher,
    site: String,
    headless: bool,
    label_window: usize,
    max_samples: Option<u64>,
    watcher: DirectoryWatcher,
    retry: RetryPolicy,
    tracker: CoverageTracker,
    samples_collected: u64,
    checkpointer: Option<Checkpointer>,
    resumed: bool,
    cancel: CancellationToken,
    phase: CollectionPhase,
}

impl<'a> CollectionDriver<'a> {
    pub fn new(
        launcher: &'a dyn BrowserLauncher,
        settings: &CollectorSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            launcher,
            site: settings.site.clone(),
            headless: settings.browser.headless,
            label_window: settings.label_window,
            max_samples: settings.max_samples,
            watcher: DirectoryWatcher::from_settings(settings),
            retry: RetryPolicy::from_settings(&settings.browser),
            tracker: CoverageTracker::new(
                settings.target_count,
                settings.expected_distinct_characters,
            ),
            samples_collected: 0,
            checkpointer: None,
            resumed: false,
            cancel,
            phase: CollectionPhase::Init,
        }
    }

    /// Attach a checkpoint store and, if it found an unfinished run, continue from there.
    pub fn with_checkpointer(mut self, checkpointer: Checkpointer, resume: Option<ResumePoint>) -> Self {
        if let Some(resume) = resume {
            self.tracker = CoverageTracker::restore(
                self.tracker.target_count(),
                self.tracker.expected_distinct(),
                resume.records,
            );
            self.samples_collected = resume.samples_collected;
            self.resumed = true;
        }
        self.checkpointer = Some(checkpointer);
        self
    }

    fn enter(&mut self, phase: CollectionPhase) {
        log_debug!("collection phase {:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    /// Run the whole state machine. The browser session is closed on every path once it has
    /// been opened; on failure the partial coverage is checkpointed as `Interrupted`, or as
    /// `Abandoned` when the directory cannot be reconciled with the checkpoint.
    pub async fn run(mut self) -> CollectResult<CollectionSummary> {
        log_info!(
            "collecting samples until {} characters reach {} occurrences",
            self.tracker.expected_distinct(),
            self.tracker.target_count()
        );

        let result = match self.reconcile_with_directory().await {
            Ok(()) => self.drive_browser().await,
            Err(err) => Err(err),
        };
        self.enter(CollectionPhase::Done);

        match result {
            Ok(outcome) => {
                self.persist_final(outcome.run_status()).await;
                log_info!(
                    "collection finished ({outcome:?}) after {} samples",
                    self.samples_collected
                );
                Ok(CollectionSummary {
                    samples_collected: self.samples_collected,
                    outcome,
                    run_id: self.checkpointer.as_ref().map(|c| c.run_id().to_string()),
                    tracker: self.tracker,
                })
            }
            Err(err) => {
                log_error!(
                    "collection aborted after {} samples: {err}",
                    self.samples_collected
                );
                let status = match err {
                    CollectError::ResumeMismatch { .. } => RunStatus::Abandoned,
                    _ => RunStatus::Interrupted,
                };
                self.persist_final(status).await;
                Err(err)
            }
        }
    }

    /// A checkpoint can trail the directory by up to `checkpoint_every - 1` samples after a
    /// hard kill. Labels live in the filenames, so the missing ones are replayed from disk.
    async fn reconcile_with_directory(&mut self) -> CollectResult<()> {
        if !self.resumed {
            return Ok(());
        }

        let existing = self.watcher.existing_samples()?;
        let on_disk = existing.len() as u64;
        if on_disk < self.samples_collected {
            return Err(CollectError::ResumeMismatch {
                directory: self.watcher.directory().to_path_buf(),
                checkpointed: self.samples_collected,
                on_disk,
            });
        }
        if on_disk == self.samples_collected {
            return Ok(());
        }

        log_warn!(
            "checkpoint is {} samples behind the directory; replaying their labels",
            on_disk - self.samples_collected
        );
        for filename in &existing[self.samples_collected as usize..] {
            let label = extract_label(filename, self.label_window)?;
            self.tracker.observe(&label);
        }
        self.samples_collected = on_disk;

        if let Some(checkpointer) = self.checkpointer.as_mut() {
            checkpointer
                .save(self.samples_collected, &self.tracker)
                .await?;
        }
        Ok(())
    }

    async fn drive_browser(&mut self) -> CollectResult<CollectionOutcome> {
        let launcher = self.launcher;
        let headless = self.headless;
        let session = self
            .retry
            .run_with(
                "open browser session",
                Some(&self.cancel),
                DriverError::is_retryable,
                move || launcher.open(headless),
            )
            .await
            .map_err(|err| self.driver_failure(err))?;

        let collected = self.collect(session.as_ref()).await;
        self.close_session(session.as_ref()).await;
        collected
    }

    /// A driver error that surfaces after Ctrl-C is reported as a cancellation.
    fn driver_failure(&self, err: DriverError) -> CollectError {
        if self.cancel.is_cancelled() {
            CollectError::Cancelled
        } else {
            CollectError::Driver(err)
        }
    }

    async fn collect(&mut self, session: &dyn BrowserSession) -> CollectResult<CollectionOutcome> {
        let site = self.site.clone();
        let url = site.as_str();
        self.retry
            .run_with(
                "navigate",
                Some(&self.cancel),
                DriverError::is_retryable,
                move || session.navigate(url),
            )
            .await
            .map_err(|err| self.driver_failure(err))?;

        // The initial page load already rendered a captcha; no refresh for the first sample.
        self.take_sample().await?;
        self.enter(CollectionPhase::Collecting);

        while !self.tracker.is_complete() {
            if self.cancel.is_cancelled() {
                return Err(CollectError::Cancelled);
            }
            if let Some(limit) = self.max_samples {
                if self.samples_collected >= limit {
                    log_warn!(
                        "sample limit {limit} reached with {}/{} characters satisfied",
                        self.tracker.satisfied_count(),
                        self.tracker.expected_distinct()
                    );
                    return Ok(CollectionOutcome::SampleLimitReached);
                }
            }

            self.refresh(session).await?;
            self.take_sample().await?;
        }

        Ok(CollectionOutcome::Complete)
    }

    /// Reloads are not idempotent: a timed-out reload may still have rendered a captcha, and
    /// a second one would put two new samples on disk. Timeouts are therefore never retried;
    /// the watcher decides whether the reload landed.
    async fn refresh(&self, session: &dyn BrowserSession) -> CollectResult<()> {
        let result = self
            .retry
            .run_with(
                "refresh",
                Some(&self.cancel),
                |err| err.is_retryable() && !matches!(err, DriverError::Timeout { .. }),
                move || session.refresh(),
            )
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err @ DriverError::Timeout { .. }) if !self.cancel.is_cancelled() => {
                log_warn!("{err}; waiting for the sample in case the reload landed");
                Ok(())
            }
            Err(err) => Err(self.driver_failure(err)),
        }
    }

    async fn take_sample(&mut self) -> CollectResult<()> {
        let last_index = self.samples_collected.checked_sub(1);
        let filename = self
            .watcher
            .await_next_sample(last_index, &self.cancel)
            .await?;
        let label = extract_label(&filename, self.label_window)?;

        self.tracker.observe(&label);
        self.samples_collected += 1;

        if let Some(checkpointer) = self.checkpointer.as_mut() {
            checkpointer
                .maybe_save(self.samples_collected, &self.tracker)
                .await?;
        }
        Ok(())
    }

    async fn close_session(&self, session: &dyn BrowserSession) {
        if let Err(err) = self.retry.run("close browser session", move || session.close()).await {
            log_warn!("failed to close browser session: {err}");
        }
    }

    async fn persist_final(&mut self, status: RunStatus) {
        let Some(checkpointer) = self.checkpointer.as_mut() else {
            return;
        };
        if let Err(err) = checkpointer
            .finish(status, self.samples_collected, &self.tracker)
            .await
        {
            log_error!("failed to persist {} checkpoint: {err}", status.as_str());
        }
    }
}
