//! # sync-cli
//!
//! Operator tool for the RepSync mutation queue.
//!
//! ## Commands
//!
//! - `status`: Show both queues
//! - `sync`: Drain the queue against the configured backend
//! - `enqueue`: Add a mutation to the queue without dispatching it
//! - `requeue`: Move every dead-lettered record back to the queue
//! - `clear`: Clear the dead-letter store (or the active queue)
//!
//! ## Example
//!
//! ```bash
//! # Inspect the queues
//! sync-cli status --verbose
//!
//! # Add a test mutation
//! sync-cli enqueue --kind recovery --local-id 42 \
//!     --payload '{"date":"2026-02-01","sleep_quality":4,"muscle_soreness":2,"mental_motivation":3}'
//!
//! # Drain against the backend configured in backend.json
//! sync-cli sync --timeout 60
//!
//! # Recover records that exhausted their retries
//! sync-cli requeue
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod config;

use commands::{clear, enqueue, requeue, status, sync};

/// Operator tool for the RepSync mutation queue.
#[derive(Parser, Debug)]
#[command(name = "sync-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding queue snapshots and configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show both queues
    Status {
        /// Print every record, not just counts
        #[arg(long, short)]
        verbose: bool,
    },

    /// Drain the queue against the configured backend
    Sync {
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Add a mutation to the queue without dispatching it
    Enqueue {
        /// Mutation kind: workout, set or recovery
        #[arg(long, short)]
        kind: String,

        /// Client row id used as the idempotency key
        #[arg(long)]
        local_id: i64,

        /// Kind-specific payload as inline JSON
        #[arg(long, short)]
        payload: String,
    },

    /// Move every dead-lettered record back to the queue
    Requeue,

    /// Clear the dead-letter store
    Clear {
        /// Clear the active queue instead
        #[arg(long)]
        queue: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = config::resolve_data_dir(cli.data_dir)?;

    match cli.command {
        Commands::Status { verbose } => status::run(&data_dir, verbose).await,
        Commands::Sync { timeout } => sync::run(&data_dir, Duration::from_secs(timeout)).await,
        Commands::Enqueue {
            kind,
            local_id,
            payload,
        } => enqueue::run(&data_dir, &kind, local_id, &payload).await,
        Commands::Requeue => requeue::run(&data_dir).await,
        Commands::Clear { queue } => clear::run(&data_dir, queue).await,
    }
}
