use anyhow::Context;
use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use covid_cli::{commands, parse_date_arg, RunContext};
use covid_config::Settings;
use covid_pipeline::SyncOptions;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,
    /// Root of the synchronized data
    #[arg(long, global = true, env = "COVID_DATA_DIR")]
    data_dir: Option<Utf8PathBuf>,
    /// Concurrent downloads (defaults to the number of CPUs)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct RangeArgs {
    /// First day to fetch (YYYY-MM-DD), defaults to the first published day
    #[arg(long, value_parser = parse_date_arg)]
    start: Option<NaiveDate>,
    /// Last day to fetch (YYYY-MM-DD), defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    end: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download missing or outdated files
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },
    /// Report what a sync would download without downloading data files
    Check {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Inventory of the local data directory
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SyncTarget {
    Contagions {
        #[command(flatten)]
        range: RangeArgs,
        /// Re-download files already on disk
        #[arg(long)]
        force: bool,
    },
    Vaccinations {
        /// Ignore the update marker and re-download every file
        #[arg(long)]
        force: bool,
    },
    All {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")?;

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let defaults = SyncOptions::default();
    let options = SyncOptions {
        parallelism: cli.threads.unwrap_or(defaults.parallelism),
        verbose: cli.verbose,
        show_progress: !cli.no_progress,
    };
    let ctx = RunContext::new(settings, cli.data_dir, options);

    match cli.command {
        Commands::Sync { target } => match target {
            SyncTarget::Contagions { range, force } => {
                commands::cmd_sync_contagions(&ctx, range.start, range.end, force).await?;
            }
            SyncTarget::Vaccinations { force } => {
                commands::cmd_sync_vaccinations(&ctx, force).await?;
            }
            SyncTarget::All { range, force } => {
                commands::cmd_sync_all(&ctx, range.start, range.end, force).await?;
            }
        },
        Commands::Check { range } => {
            commands::cmd_check(&ctx, range.start, range.end).await?;
        }
        Commands::Status { json } => {
            commands::cmd_status(&ctx, json)?;
        }
    }

    Ok(())
}
