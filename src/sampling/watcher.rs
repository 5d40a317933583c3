use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::error::{CollectError, CollectResult};
use crate::settings::CollectorSettings;
use crate::utils::natural_sort;

use super::poll::{await_condition, WaitError};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Entries expected once the sample after `sample_index` has landed: every earlier sample,
/// the new one, and the sentinel.
pub fn expected_entries(sample_index: Option<u64>) -> usize {
    sample_index.map_or(2, |index| index as usize + 3)
}

/// Pick the newest sample out of a raw listing, or `None` while the listing is still in a
/// transient state (wrong entry count, or the sentinel not last under natural order).
pub fn select_sample(listing: &[String], sample_index: Option<u64>, sentinel: &str) -> Option<String> {
    if listing.len() != expected_entries(sample_index) {
        return None;
    }

    let mut sorted = listing.to_vec();
    natural_sort(&mut sorted);

    if sorted.last().map(String::as_str) != Some(sentinel) {
        return None;
    }

    let position = sample_index.map_or(0, |index| index as usize + 1);
    sorted.get(position).cloned()
}

/// Waits for the external writer to deposit the next sample next to its sentinel file.
#[derive(Debug, Clone)]
pub struct DirectoryWatcher {
    directory: PathBuf,
    sentinel: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl DirectoryWatcher {
    pub fn new(
        directory: impl Into<PathBuf>,
        sentinel: impl Into<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            directory: directory.into(),
            sentinel: sentinel.into(),
            poll_interval,
            timeout,
        }
    }

    pub fn from_settings(settings: &CollectorSettings) -> Self {
        Self::new(
            settings.directory.clone(),
            settings.sentinel.clone(),
            settings.poll_interval(),
            settings.watch_timeout(),
        )
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Samples already in the directory, in natural order, without the sentinel.
    pub fn existing_samples(&self) -> CollectResult<Vec<String>> {
        let mut samples: Vec<String> = self
            .snapshot()?
            .into_iter()
            .filter(|name| *name != self.sentinel)
            .collect();
        natural_sort(&mut samples);
        Ok(samples)
    }

    /// Block until the listing holds `sample_index + 3` entries with the sentinel last, then
    /// return the entry at `sample_index + 1`. `None` means no sample has been consumed yet.
    pub async fn await_next_sample(
        &self,
        sample_index: Option<u64>,
        cancel: &CancellationToken,
    ) -> CollectResult<String> {
        let expected = expected_entries(sample_index);
        let mut polls: u64 = 0;

        let result = await_condition(
            || {
                polls += 1;
                let listing = self.snapshot()?;
                Ok(select_sample(&listing, sample_index, &self.sentinel))
            },
            self.timeout,
            self.poll_interval,
            cancel,
        )
        .await;

        match result {
            Ok(filename) => {
                log_info!("latest sample: {filename}");
                log_debug!("listing settled at {expected} entries after {polls} polls");
                Ok(filename)
            }
            Err(WaitError::Probe(err)) => Err(err),
            Err(WaitError::Cancelled) => Err(CollectError::Cancelled),
            Err(WaitError::TimedOut { waited }) => Err(CollectError::WatchTimeout {
                directory: self.directory.clone(),
                expected_entries: expected,
                waited,
            }),
        }
    }

    fn snapshot(&self) -> CollectResult<Vec<String>> {
        let io_err = |source| CollectError::Io {
            path: self.directory.clone(),
            source,
        };

        fs::read_dir(&self.directory)
            .map_err(io_err)?
            .map(|entry| {
                entry
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .map_err(io_err)
            })
            .collect()
    }
}
