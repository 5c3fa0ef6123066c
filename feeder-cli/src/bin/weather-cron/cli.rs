use clap::Parser;
use feeder_core::{
    Collector, CollectorReport, Config, EventsApiSink, StdoutSink,
    collector::{ensure_cities, load_cities},
    provider::weather_source_from_config,
};
use tracing::warn;

/// Top-level CLI struct. The job takes no flags; everything comes from config.
#[derive(Debug, Parser)]
#[command(
    name = "weather-cron",
    version,
    about = "Fetch current weather for every configured city and write the location table"
)]
pub struct Cli {}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;
        let report = collect(&config).await?;

        if !report.failed.is_empty() {
            let cities: Vec<&str> = report.failed.iter().map(|(c, _)| c.as_str()).collect();
            warn!(count = cities.len(), ?cities, "some cities were skipped");
        }

        Ok(())
    }
}

async fn collect(config: &Config) -> anyhow::Result<CollectorReport> {
    let settings = &config.collector;

    let cities = load_cities(&settings.cities_file)?;
    ensure_cities(&cities, &settings.cities_file)?;

    let source = weather_source_from_config(config)?;
    let mut collector =
        Collector::from_config(source.as_ref(), settings).with_sink(Box::new(StdoutSink));

    if settings.forward_events {
        let token = config.tinybird_token()?;
        collector = collector.with_sink(Box::new(EventsApiSink::from_config(
            &config.tinybird,
            &settings.events_datasource,
            token,
        )));
    }

    collector.collect_to_file(&cities, &settings.output_file).await
}
