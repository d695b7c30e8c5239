//! Adapter freshness checker
//! Batch job that flags adapters whose locations stopped reporting
//!
//! Usage:
//!   adapter-freshness check --source "Australia - Queensland"
//!   adapter-freshness reconcile --skip "Retired Adapter"

use adapter_freshness::checker::{FreshnessChecker, LedgerSet};
use adapter_freshness::config::Config;
use adapter_freshness::reconcile::reconcile;
use adapter_freshness::skiplist::SkipList;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Adapter freshness checker - flags stale monitoring locations
#[derive(Parser, Debug)]
#[command(name = "adapter-freshness")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Checks last updates for adapters and keeps stale/fresh ledgers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check every adapter, append to the ledgers and reconcile
    Check {
        /// Measurements API url with an {id} placeholder
        #[arg(long)]
        api_url: Option<String>,

        /// Days without data after which a location is stale
        #[arg(long)]
        days_ago: Option<u32>,

        /// Folder with the adapter definition JSON files
        #[arg(long)]
        source_folder: Option<PathBuf>,

        /// CSV export with the location ids of each adapter
        #[arg(long)]
        adapters_ids_file: Option<PathBuf>,

        /// CSV of adapters already reviewed (adapter_id column)
        #[arg(long)]
        reviewed_resources_file: Option<PathBuf>,

        /// Only check this adapter
        #[arg(long)]
        source: Option<String>,

        /// Maximum lookups in flight per adapter
        #[arg(long)]
        max_concurrent: Option<usize>,

        #[command(flatten)]
        ledgers: LedgerArgs,
    },

    /// Only reconcile the stale ledger against the fresh ledger
    Reconcile {
        #[command(flatten)]
        ledgers: LedgerArgs,
    },
}

#[derive(Args, Debug)]
struct LedgerArgs {
    /// CSV path for out of date adapters
    #[arg(long)]
    outdate_file: Option<PathBuf>,

    /// CSV path for up to date adapters
    #[arg(long)]
    update_file: Option<PathBuf>,

    /// Adapter to leave out entirely (repeatable)
    #[arg(long = "skip")]
    skip: Vec<String>,
}

impl LedgerArgs {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.outdate_file {
            config.outdate_file = path;
        }
        if let Some(path) = self.update_file {
            config.update_file = path;
        }
        config.skip_adapters.extend(self.skip);
    }
}

/// Generates a new id for the run
fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    let run_id = generate_run_id();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        run_id = %run_id,
        "Starting adapter freshness checker"
    );

    let mut config = Config::load()?;

    match cli.command {
        Commands::Check {
            api_url,
            days_ago,
            source_folder,
            adapters_ids_file,
            reviewed_resources_file,
            source,
            max_concurrent,
            ledgers,
        } => {
            if let Some(url) = api_url {
                config.api_url = url;
            }
            if let Some(days) = days_ago {
                config.days_ago = days;
            }
            if let Some(dir) = source_folder {
                config.source_folder = dir;
            }
            if let Some(path) = adapters_ids_file {
                config.adapters_ids_file = path;
            }
            if let Some(path) = reviewed_resources_file {
                config.reviewed_resources_file = Some(path);
            }
            if let Some(n) = max_concurrent {
                config.max_concurrent_requests = n;
            }
            ledgers.apply(&mut config);
            config.validate()?;

            info!(
                api_url = %config.api_url,
                days_ago = config.days_ago,
                source_folder = %config.source_folder.display(),
                outdate_file = %config.outdate_file.display(),
                update_file = %config.update_file.display(),
                "Configuration loaded"
            );

            let checker = FreshnessChecker::new(config, run_id)?;
            let summary = checker.run(source.as_deref()).await?;

            println!("\nFreshness Summary");
            println!("=================");
            println!("Adapters checked:   {}", summary.adapters_checked);
            println!("Adapters skipped:   {}", summary.adapters_skipped);
            println!("Locations checked:  {}", summary.locations_checked);
            println!("Fresh rows added:   {}", summary.fresh_rows);
            println!("Stale rows added:   {}", summary.stale_rows);
            println!("Stale ledger rows:  {}", summary.reconcile.rows_kept);
        }

        Commands::Reconcile { ledgers } => {
            ledgers.apply(&mut config);

            let skip = SkipList::from_config(&config)?;
            let ledgers = LedgerSet::from_config(&config);
            let report = reconcile(&ledgers.stale_accumulator, &ledgers.stale, &ledgers.fresh, &skip)?;

            println!(
                "Reconciled {}: kept {} of {} rows",
                ledgers.stale.path().display(),
                report.rows_kept,
                report.rows_read
            );
        }
    }

    Ok(())
}
