use std::path::PathBuf;

use clap::Parser;

use crate::settings::CollectorSettings;

/// Collect captcha samples until every character has been seen N times.
///
/// Run with no positional arguments to use the defaults (local Drupal site, current
/// directory, N = 100), or pass all three.
#[derive(Parser, Debug)]
#[command(name = "captcha-collector", version)]
pub struct Cli {
    /// Form URL the browser keeps refreshing to render new captchas.
    #[arg(requires_all = ["directory", "target_count"])]
    pub site: Option<String>,

    /// Directory where the captcha generator writes images and its sentinel file.
    pub directory: Option<PathBuf>,

    /// Occurrences required per character; final counts will be >= this.
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub target_count: Option<u64>,

    /// JSON settings file; missing keys fall back to defaults.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite checkpoint database (must be outside the watched directory).
    #[arg(long = "state", value_name = "FILE")]
    pub state_path: Option<PathBuf>,

    /// Where to write the CSV report.
    #[arg(long = "report", value_name = "FILE")]
    pub report_path: Option<PathBuf>,

    /// Start a fresh run even if an interrupted one matches.
    #[arg(long, default_value_t = false)]
    pub no_resume: bool,

    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Overlay command-line values on top of file or default settings.
    pub fn apply(&self, settings: &mut CollectorSettings) {
        if let (Some(site), Some(directory), Some(target_count)) =
            (&self.site, &self.directory, self.target_count)
        {
            settings.site = site.clone();
            settings.directory = directory.clone();
            settings.target_count = target_count;
        }
        if let Some(state_path) = &self.state_path {
            settings.state_path = state_path.clone();
        }
        if let Some(report_path) = &self.report_path {
            settings.report_path = report_path.clone();
        }
        if self.no_resume {
            settings.resume = false;
        }
    }
}
