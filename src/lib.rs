pub mod browser;
pub mod cli;
pub mod db;
pub mod error;
pub mod report;
pub mod sampling;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use browser::WebDriverLauncher;
use cli::Cli;
use db::Database;
use report::build_report;
use sampling::{Checkpointer, CollectionDriver, CollectionOutcome};
use settings::CollectorSettings;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    log::info!("captcha-collector starting up...");

    // One logical actor: the poll loop never needs more than a single thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(collect(cli))
}

async fn collect(cli: Cli) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => CollectorSettings::load(path)?,
        None => CollectorSettings::default(),
    };
    cli.apply(&mut settings);
    settings.validate().context("invalid settings")?;

    log::info!(
        "Collecting images of alphanumeric sample size: {} from {} into {}",
        settings.target_count,
        settings.site,
        settings.directory.display()
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupt received; stopping collection");
                cancel.cancel();
            }
        });
    }

    let launcher = WebDriverLauncher::new(&settings.browser)
        .context("failed to set up WebDriver client")?;
    let database = Database::new(settings.state_path.clone())?;
    let (checkpointer, resume) = Checkpointer::start(database, &settings)
        .await
        .context("failed to prepare checkpoint store")?;

    let summary = CollectionDriver::new(&launcher, &settings, cancel)
        .with_checkpointer(checkpointer, resume)
        .run()
        .await?;

    if summary.outcome == CollectionOutcome::SampleLimitReached {
        log::warn!("writing a partial report: coverage did not complete");
    }

    let report = build_report(summary.tracker.records(), summary.samples_collected);
    report.write_csv(&settings.report_path)?;

    log::info!("Finished!");
    Ok(())
}
