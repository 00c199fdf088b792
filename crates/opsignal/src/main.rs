//! OpSignal - telemetry ingestion and analytics server
//!
//! Single binary that:
//! - accepts batched operational signals from distributed agents
//! - persists them durably, scoped to the owning tenant
//! - serves filtered retrieval, grouped summaries and time-bucketed
//!   histograms to dashboards

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod config;
mod server;

use server::OpSignalServer;

#[derive(Parser)]
#[command(name = "opsignal")]
#[command(author, version, about = "OpSignal - telemetry ingestion and analytics", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the OpSignal server
    Server {
        /// Configuration file path
        #[arg(short, long, default_value = "/etc/opsignal/opsignal.toml")]
        config: String,
    },

    /// Issue a dashboard session token
    IssueToken {
        /// Configuration file path
        #[arg(short, long, default_value = "/etc/opsignal/opsignal.toml")]
        config: String,

        /// Dashboard user id
        #[arg(long)]
        user_id: String,

        /// Tenant (company) id the token is scoped to
        #[arg(long)]
        company_id: String,

        /// Role claim
        #[arg(long, default_value = "viewer")]
        role: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("opsignal=info".parse()?),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config } => {
            info!("Starting OpSignal server...");

            let config = config::load(&config).await?;
            let server = OpSignalServer::new(&config)?;

            // Handle shutdown gracefully
            let shutdown = async {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received");
            };

            tokio::select! {
                result = server.run() => result?,
                _ = shutdown => {
                    server.shutdown()?;
                }
            }
        }

        Commands::IssueToken {
            config,
            user_id,
            company_id,
            role,
        } => {
            let config = config::load(&config).await?;
            let security = opsignal_security::SecurityManager::new(&config.security)?;
            let token = security.issue_session_token(&opsignal_common::types::SessionIdentity {
                user_id,
                company_id,
                role,
            })?;
            println!("{token}");
        }

        Commands::Version => {
            println!("OpSignal version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
