//! # shop-sync
//!
//! Backs up the products and customers of a store to JSON files and restores
//! them again.
//!
//! ```bash
//! SHOPIFY_ACCESS_TOKEN=shpat_... shop-sync --store teststore.myshopify.com backup --dir /var/backups
//! shop-sync --config shop.toml restore /var/backups/backup_2026_10_17_09_30_00_bkp-1a2b3c4d5e --filter handle=red-shirt
//! ```

use clap::{Parser, Subcommand};
use shop_sync::config::Config;
use shop_sync::engine::ResourceType;
use shop_sync::lifecycle::{setup_tracing, RunnerReport, SyncSystem};
use shop_sync::runner::restore::{RestoreFilter, RestoreOptions};
use std::path::PathBuf;
use tracing::{info, warn, Instrument};

#[derive(Parser)]
#[command(name = "shop-sync", version, about = "Back up and restore a store through its GraphQL Admin API")]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store domain, e.g. teststore.myshopify.com.
    #[arg(long, global = true)]
    store: Option<String>,

    /// Top-level resource to process (product or customer). Repeatable; defaults to all.
    #[arg(long = "resource", global = true)]
    resources: Vec<ResourceType>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save resources into a new timestamped backup folder.
    Backup {
        /// Directory the backup folder is created in.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Prefix of the backup folder name.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Recreate resources from a backup folder.
    Restore {
        /// Backup folder, the one containing products/ and customers/.
        path: PathBuf,

        /// Read and match the backup without calling the API.
        #[arg(long)]
        dry_run: bool,

        /// Only restore documents whose field equals value. Repeatable.
        #[arg(long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
    },
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let config = match &cli.config {
        Some(path) => Config::load(path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };
    let mut config = config.apply_env();
    if let Some(store) = &cli.store {
        config.store = store.clone();
    }
    if let Command::Backup { dir, prefix } = &cli.cmd {
        if let Some(dir) = dir {
            config.backup_dir = dir.clone();
        }
        if let Some(prefix) = prefix {
            config.backup_prefix = prefix.clone();
        }
    }
    Ok(config)
}

/// Prints one line per resource type and returns the number of failures.
fn print_reports(reports: &[RunnerReport]) -> usize {
    let mut failed = 0;
    for report in reports {
        if let Some(err) = &report.error {
            println!("{}: {err}", report.kind);
            failed += 1;
        }
        for (kind, summary) in &report.stats {
            println!(
                "{:<20} total={:<6} passed={:<6} failed={:<6} skipped={}",
                kind.as_str(),
                summary.count, summary.passed, summary.failed, summary.skipped
            );
        }
        failed += report.failed();
    }
    failed
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let kinds = if cli.resources.is_empty() {
        ResourceType::primary().to_vec()
    } else {
        cli.resources.clone()
    };

    let system = SyncSystem::new(config).map_err(|e| e.to_string())?;

    let cancel = system.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing resources in flight");
            cancel.cancel();
        }
    });

    let reports = match cli.cmd {
        Command::Backup { .. } => {
            let span = tracing::info_span!("backup");
            let report = system.backup(&kinds).instrument(span).await.map_err(|e| e.to_string())?;
            println!("backup {} written to {}", report.id, report.root.display());
            report.runners
        }
        Command::Restore { path, dry_run, filters } => {
            let options = RestoreOptions {
                dry_run,
                filter: RestoreFilter::parse(&filters).map_err(|e| e.to_string())?,
            };
            let span = tracing::info_span!("restore");
            system
                .restore(&path, &kinds, options)
                .instrument(span)
                .await
                .map_err(|e| e.to_string())?
        }
    };

    let failed = print_reports(&reports);
    system.shutdown();
    info!(failed, "Finished");

    if failed > 0 {
        return Err(format!("{failed} resources failed"));
    }
    Ok(())
}
