// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier - operator entry point for the message and notification queues.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod prepare;
mod shutdown;
mod stats;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use notifier_config::NotifierConfig;
use notifier_core::NotifierError;
use notifier_storage::{Database, StoreClient};
use tracing::{Instrument, error, info_span};

/// Notifier - chat-partitioned message queue and delayed notification queue.
#[derive(Parser, Debug)]
#[command(name = "notifier", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply migrations and create the queue indexes.
    PrepareIndexes,
    /// Print queue counters.
    Stats {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Repeat every N seconds until interrupted.
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => notifier_config::load_and_validate_path(path),
        None => notifier_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            notifier_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.level);
    let root = info_span!(
        "notifier",
        service_name = %config.service.name,
        server_id = %config.service.server_id,
    );

    let result = run(cli.command, &config).instrument(root.clone()).await;
    let _entered = root.enter();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Option<Commands>, config: &NotifierConfig) -> Result<(), NotifierError> {
    match command {
        Some(Commands::PrepareIndexes) => prepare::run_prepare_indexes(config).await,
        Some(Commands::Stats { json, interval }) => {
            let shutdown = shutdown::install_signal_handler();
            let result = stats::run_stats(
                config,
                json,
                interval.map(Duration::from_secs),
                shutdown.clone(),
            )
            .await;
            shutdown.cancel();
            result
        }
        None => {
            println!("notifier: use --help for available commands");
            Ok(())
        }
    }
}

/// Opens the configured database and wraps it in a store client.
pub(crate) async fn open_client(config: &NotifierConfig) -> Result<StoreClient, NotifierError> {
    let db = Database::open(&config.storage).await?;
    Ok(StoreClient::new(Arc::new(db), &config.storage))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    // Targets match by prefix, so `notifier` also covers the notifier_* crates.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("notifier={},warn", log_level.to_lowercase()))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn default_config_is_valid() {
        let config = notifier_config::load_and_validate_str("").expect("defaults should validate");
        assert_eq!(config.service.name, "notifier");
    }

    #[test]
    fn parses_stats_flags() {
        let cli = Cli::try_parse_from(["notifier", "stats", "--json", "--interval", "5"]).unwrap();
        match cli.command {
            Some(Commands::Stats { json, interval }) => {
                assert!(json);
                assert_eq!(interval, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = Cli::try_parse_from(["notifier", "stats", "--interval", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["notifier", "prepare-indexes", "--config", "/tmp/n.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/n.toml")));
        assert!(matches!(cli.command, Some(Commands::PrepareIndexes)));
    }
}
