//! Binary for the `weather-cron` batch job.
//!
//! Meant to be run from cron: one pass over the city list, then exit.

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
