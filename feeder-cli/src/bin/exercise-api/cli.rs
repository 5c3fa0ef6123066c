use std::sync::Arc;

use clap::Parser;
use feeder_core::{
    Config, Generator, GeneratorSummary, Rpm,
    generator::TinybirdPipe,
};
use tracing::{info, warn};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "exercise-api",
    version,
    about = "Call a Tinybird pipe endpoint at a fixed rate and count successes"
)]
pub struct Cli {
    /// Pipe name, e.g. "sensor_stats".
    pub endpoint: String,

    /// Number of requests per minute.
    #[arg(long, default_value_t = i64::from(Rpm::DEFAULT), allow_negative_numbers = true)]
    pub rpm: i64,

    /// Cap on concurrent in-flight requests; overrides the config file.
    #[arg(long)]
    pub max_in_flight: Option<usize>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let rpm = Rpm::new(self.rpm)?;

        let config = Config::load()?;
        let token = config.tinybird_token()?;
        let pipe = TinybirdPipe::from_config(&config.tinybird, &self.endpoint, token)?;
        let max_in_flight = self.max_in_flight.unwrap_or(config.generator.max_in_flight);

        let generator = Generator::new(rpm, max_in_flight, Arc::new(pipe))?
            .with_drain_timeout(config.generator.drain_timeout());

        info!("Making {rpm} requests per minute (rpm) to {}", self.endpoint);

        let summary = generator.spin_until(interrupted()).await;
        report(&summary);

        Ok(())
    }
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

fn report(summary: &GeneratorSummary) {
    info!(
        scheduled = summary.scheduled,
        dropped = summary.dropped,
        succeeded = summary.succeeded,
        failed = summary.failed,
        abandoned = summary.abandoned,
        "run finished"
    );
}
