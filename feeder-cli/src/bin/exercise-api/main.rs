//! Binary for the `exercise-api` load generator.
//!
//! This binary focuses on:
//! - Parsing CLI arguments
//! - Wiring config and the Tinybird pipe client into the generator
//! - Reporting a summary when interrupted

use clap::Parser;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish()
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
