//! CLI command definitions for stormpipe.
//!
//! Audit and fix are the same traversal behind a single boolean toggle;
//! the remaining commands cover single-run processing, bulk regeneration
//! and the index page.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::feed::HttpFeed;
use crate::pipeline::{PipelineController, RunDescriptor, StageKind};
use crate::producers::CommandProducers;
use crate::registry::RunId;
use crate::store::FsStore;

/// Tropical cyclone displacement forecast pipeline driver.
#[derive(Parser)]
#[command(name = "stormpipe")]
#[command(about = "Audit, heal and publish tropical cyclone displacement forecasts")]
#[command(version)]
#[command(
    long_about = "stormpipe drives a recurring forecast production pipeline.\n\nEach forecast run is walked through six stages (download, track analysis, wind fields, impacts, impact analysis, report); completeness is inferred from the artifact directory tree, so re-running after a crash resumes wherever artifacts are missing.\n\nExample usage:\n  stormpipe audit --working-dir /data/forecasts\n  stormpipe fix"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Root of the per-run directory tree.
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Listing endpoint of the remote forecast feed.
    #[arg(long, global = true)]
    pub feed_url: Option<String>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Report completeness of every known run, without side effects.
    Audit,

    /// Audit every known run, regenerate missing artifacts and rebuild the
    /// index page.
    Fix,

    /// Run the full production chain for one forecast.
    ///
    /// With no run id, processes the latest remote cycle, falling back to
    /// the previous one when the newest has not been uploaded yet.
    Process(ProcessArgs),

    /// Force one stage's producer across every local run.
    Regenerate(RegenerateArgs),

    /// Rebuild the aggregate index page from finished reports.
    Index,
}

/// Arguments for `stormpipe process`.
#[derive(Parser)]
pub struct ProcessArgs {
    /// Run to process (YYYYMMDDHHMMSS); latest remote cycle if omitted.
    pub run_id: Option<RunId>,

    /// Regenerate analysis stages even when their output exists.
    #[arg(long)]
    pub overwrite: bool,

    /// Re-download the raw forecast data as well.
    #[arg(long)]
    pub redownload: bool,
}

/// Arguments for `stormpipe regenerate`.
#[derive(Parser)]
pub struct RegenerateArgs {
    /// Stage to regenerate (download, track_analysis, wind_fields,
    /// impacts, impact_analysis, report).
    #[arg(long)]
    pub stage: String,
}

/// Parse CLI arguments without running a command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.working_dir {
        config.working_dir = dir;
    }
    if let Some(url) = cli.feed_url {
        config.feed_url = url;
    }
    config.validate()?;

    let feed = HttpFeed::new(config.feed_url.clone(), config.feed_timeout);
    let store = FsStore::new(config.working_dir.clone());
    let producers = CommandProducers::new(config.producers.clone());
    let controller = PipelineController::new(config, store, producers);

    match cli.command {
        Commands::Audit => {
            let rows = controller.check_outputs(&feed, false).await?;
            summarize(&rows);
        }
        Commands::Fix => {
            let rows = controller.check_outputs(&feed, true).await?;
            summarize(&rows);
        }
        Commands::Process(args) => {
            let run = controller
                .process_single(&feed, args.run_id, args.overwrite, args.redownload)
                .await?;
            info!(run = %run, "forecast processing finished");
        }
        Commands::Regenerate(args) => {
            let stage = StageKind::from_name(&args.stage)
                .ok_or_else(|| anyhow::anyhow!("unknown stage '{}'", args.stage))?;
            let failures = controller.regenerate_stage(stage).await;
            if failures > 0 {
                anyhow::bail!("{failures} run(s) failed to regenerate");
            }
        }
        Commands::Index => {
            let page = controller.rebuild_index().await?;
            info!(page = %page.display(), "index page rebuilt");
        }
    }

    Ok(())
}

fn summarize(rows: &[RunDescriptor]) {
    let complete = rows.iter().filter(|r| r.report_ok).count();
    let with_errors = rows.iter().filter(|r| !r.errors.is_empty()).count();
    info!(
        runs = rows.len(),
        complete, with_errors, "completeness check finished"
    );
}
