use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_SITE: &str = "http://127.0.0.1:81/drupal/";
pub const DEFAULT_TARGET_COUNT: u64 = 100;
pub const DEFAULT_SENTINEL: &str = "solution.txt";
pub const DEFAULT_REPORT_FILE: &str = "alphaNumericCount.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BrowserKind {
    Firefox,
    Chrome,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Firefox => "firefox",
            BrowserKind::Chrome => "chrome",
        }
    }
}

/// How to reach the WebDriver server and which browser it should launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub browser: BrowserKind,
    pub headless: bool,
    pub request_timeout_ms: u64,
    /// Attempts per driver operation, including the first one.
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:4444".into(),
            browser: BrowserKind::Firefox,
            headless: true,
            request_timeout_ms: 30_000,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

/// Everything a collection run needs. Loaded from an optional JSON file, then overlaid by
/// the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectorSettings {
    pub site: String,
    pub directory: PathBuf,
    pub target_count: u64,
    pub sentinel: String,
    pub label_window: usize,
    pub expected_distinct_characters: usize,
    pub poll_interval_ms: u64,
    pub watch_timeout_ms: u64,
    /// Stops the run even when coverage is incomplete. `None` means unbounded.
    pub max_samples: Option<u64>,
    pub checkpoint_every: u64,
    pub resume: bool,
    pub state_path: PathBuf,
    pub report_path: PathBuf,
    pub browser: BrowserSettings,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            site: DEFAULT_SITE.into(),
            directory: PathBuf::from("."),
            target_count: DEFAULT_TARGET_COUNT,
            sentinel: DEFAULT_SENTINEL.into(),
            label_window: 5,
            expected_distinct_characters: 62,
            poll_interval_ms: 50,
            watch_timeout_ms: 60_000,
            max_samples: None,
            checkpoint_every: 10,
            resume: true,
            state_path: std::env::temp_dir()
                .join("captcha-collector")
                .join("state.sqlite3"),
            report_path: PathBuf::from(DEFAULT_REPORT_FILE),
            browser: BrowserSettings::default(),
        }
    }
}

impl CollectorSettings {
    /// Read settings from `path`. A missing file yields the defaults; a file that exists but
    /// does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn watch_timeout(&self) -> Duration {
        Duration::from_millis(self.watch_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_count == 0 {
            bail!("target count must be at least 1");
        }
        if self.label_window == 0 {
            bail!("label window must be at least 1 character");
        }
        if self.expected_distinct_characters == 0 {
            bail!("expected distinct characters must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll interval must be greater than zero");
        }
        if self.watch_timeout_ms < self.poll_interval_ms {
            bail!(
                "watch timeout ({}ms) is shorter than the poll interval ({}ms)",
                self.watch_timeout_ms,
                self.poll_interval_ms
            );
        }
        if self.max_samples == Some(0) {
            bail!("max samples must be at least 1 when set");
        }
        if self.checkpoint_every == 0 {
            bail!("checkpoint interval must be at least 1 sample");
        }
        if self.browser.retry_attempts == 0 {
            bail!("browser retry attempts must be at least 1");
        }
        if self.sentinel.is_empty() {
            bail!("sentinel filename must not be empty");
        }
        if state_inside_directory(&self.state_path, &self.directory) {
            bail!(
                "state database {} must live outside the watched directory {}",
                self.state_path.display(),
                self.directory.display()
            );
        }
        Ok(())
    }
}

/// Extra files in the watched directory break the entry-count contract with the writer, so
/// the SQLite file (and its WAL siblings) must be elsewhere.
fn state_inside_directory(state_path: &Path, directory: &Path) -> bool {
    let Some(parent) = state_path.parent() else {
        return false;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    match (fs::canonicalize(parent), fs::canonicalize(directory)) {
        (Ok(parent), Ok(directory)) => parent.starts_with(&directory),
        _ => false,
    }
}
