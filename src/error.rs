use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by a browser automation session.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The HTTP exchange with the WebDriver server itself failed.
    #[error("webdriver request {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// No reply within the client timeout. The command may still have reached the browser.
    #[error("webdriver request {endpoint} timed out")]
    Timeout { endpoint: String },

    /// The WebDriver server answered with a W3C error payload.
    #[error("webdriver returned {status} for {endpoint}: {error}: {message}")]
    Protocol {
        endpoint: String,
        status: u16,
        error: String,
        message: String,
    },

    #[error("webdriver response for {endpoint} was malformed: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    #[error("browser session is already closed")]
    SessionClosed,
}

impl DriverError {
    /// Transport hiccups and server-side 5xx answers are worth another attempt; a dead or
    /// unknown session is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriverError::Transport { .. } | DriverError::Timeout { .. } => true,
            DriverError::Protocol { status, error, .. } => {
                *status >= 500 && error != "invalid session id"
            }
            DriverError::MalformedResponse { .. } | DriverError::SessionClosed => false,
        }
    }
}

/// Everything that can abort a collection run.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("malformed sample filename {filename:?}: no ')' delimiter")]
    MalformedFilename { filename: String },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(
        "timed out after {waited:?} waiting for {expected_entries} entries with the sentinel last in {}",
        directory.display()
    )]
    WatchTimeout {
        directory: PathBuf,
        expected_entries: usize,
        waited: Duration,
    },

    #[error(
        "cannot resume: checkpoint recorded {checkpointed} samples but {} holds only {on_disk}",
        directory.display()
    )]
    ResumeMismatch {
        directory: PathBuf,
        checkpointed: u64,
        on_disk: u64,
    },

    #[error("collection cancelled")]
    Cancelled,

    #[error("failed to list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint persistence failed: {0:#}")]
    Checkpoint(anyhow::Error),
}

pub type CollectResult<T> = Result<T, CollectError>;
