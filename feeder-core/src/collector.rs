//! Single-pass weather collection over a fixed city list.

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::{fs, path::Path, time::Duration};
use tracing::{info, warn};

use crate::{
    config::{CollectorConfig, FailurePolicy},
    model::{LocationMetadata, WeatherRecord},
    provider::WeatherSource,
    sink::RecordSink,
};

pub mod table;

pub use table::write_locations;

/// Read a comma-separated city list. Values may span several lines; each is
/// trimmed and empty values are skipped.
pub fn load_cities(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read city list: {}", path.display()))?;
    parse_cities(&contents)
}

pub fn parse_cities(contents: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut cities = Vec::new();
    for row in reader.records() {
        let row = row.context("Failed to parse city list")?;
        cities.extend(row.iter().filter(|c| !c.is_empty()).map(str::to_owned));
    }

    Ok(cities)
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectorReport {
    /// One entry per successfully collected city, in input order.
    pub locations: Vec<LocationMetadata>,
    /// Cities skipped under [`FailurePolicy::Skip`], with the reason.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct Collector<'a> {
    source: &'a dyn WeatherSource,
    sinks: Vec<Box<dyn RecordSink>>,
    pace: Duration,
    policy: FailurePolicy,
}

impl<'a> Collector<'a> {
    pub fn new(source: &'a dyn WeatherSource, pace: Duration, policy: FailurePolicy) -> Self {
        Self {
            source,
            sinks: Vec::new(),
            pace,
            policy,
        }
    }

    pub fn from_config(source: &'a dyn WeatherSource, config: &CollectorConfig) -> Self {
        Self::new(source, config.pace(), config.on_error)
    }

    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Fetch every city in order, pacing consecutive upstream calls.
    pub async fn run(&self, cities: &[String]) -> Result<CollectorReport> {
        let mut report = CollectorReport::default();

        for (i, city) in cities.iter().enumerate() {
            if i > 0 && !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }

            match self.collect_one(city).await {
                Ok(location) => report.locations.push(location),
                Err(err) => match self.policy {
                    FailurePolicy::Abort => {
                        return Err(err.context(format!("Aborting batch at city '{city}'")));
                    }
                    FailurePolicy::Skip => {
                        warn!(city = %city, error = %format!("{err:#}"), "skipping city");
                        report.failed.push((city.clone(), format!("{err:#}")));
                    }
                },
            }
        }

        info!(
            collected = report.locations.len(),
            failed = report.failed.len(),
            "weather pass complete"
        );
        Ok(report)
    }

    /// [`Collector::run`] followed by writing the location table to `output`.
    pub async fn collect_to_file(&self, cities: &[String], output: &Path) -> Result<CollectorReport> {
        let report = self.run(cities).await?;
        write_locations(output, &report.locations)?;
        info!("CSV file '{}' has been created.", output.display());
        Ok(report)
    }

    async fn collect_one(&self, city: &str) -> Result<LocationMetadata> {
        let obs = self.source.current(city).await?;
        let record = WeatherRecord::from_observation(city, &obs, &Local)?;
        let location = LocationMetadata::from_observation(city, &obs);

        info!(
            city,
            site_name_owm = %location.site_name_owm,
            timezone = location.timezone,
            lon = location.long,
            lat = location.lat,
            "location resolved"
        );

        for sink in &self.sinks {
            if let Err(err) = sink.send(&record).await {
                warn!(city, error = %format!("{err:#}"), "record sink failed");
            }
        }

        Ok(location)
    }
}

/// An empty city list is an error.
pub fn ensure_cities(cities: &[String], path: &Path) -> Result<()> {
    if cities.is_empty() {
        return Err(anyhow!("City list {} contains no cities", path.display()));
    }
    Ok(())
}
