//! basaltd: the Basalt daemon.
//!
//! A single-node backend host whose distinguishing feature is the
//! embedded lambda runtime: function records in the `lambdas`
//! collection become live HTTP routes, database triggers, and cron
//! jobs.
//!
//! # Usage
//!
//! ```text
//! basaltd serve --port 8090 --admin-port 8091 --data-dir /var/lib/basalt
//! ```
//!
//! Two listeners come up: the lambda router on `--port` (routes exactly
//! as configured in each function's triggers) and the admin REST API on
//! `--admin-port` for managing the `lambdas` collection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use basaltd::host;

#[derive(Parser)]
#[command(name = "basaltd", about = "Basalt daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the host with the lambda runtime.
    Serve {
        /// Port for lambda HTTP routes.
        #[arg(long, default_value = "8090")]
        port: u16,

        /// Port for the admin REST API.
        #[arg(long, default_value = "8091")]
        admin_port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/basalt")]
        data_dir: PathBuf,

        /// Default per-function execution budget in milliseconds.
        #[arg(long, default_value = "30000")]
        default_timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,basaltd=debug,basalt=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            admin_port,
            data_dir,
            default_timeout_ms,
        } => host::run_serve(port, admin_port, data_dir, default_timeout_ms).await,
    }
}
