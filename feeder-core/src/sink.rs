use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

use crate::{config::TinybirdConfig, model::WeatherRecord, provider::openweather::truncate_body};

/// Destination for shaped weather records.
#[async_trait]
pub trait RecordSink: Send + Sync + Debug {
    async fn send(&self, record: &WeatherRecord) -> Result<()>;
}

/// Prints each record as one JSON line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[async_trait]
impl RecordSink for StdoutSink {
    async fn send(&self, record: &WeatherRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize weather record")?;
        println!("{line}");
        Ok(())
    }
}

/// Forwards records to the Tinybird Events API.
#[derive(Debug, Clone)]
pub struct EventsApiSink {
    url: String,
    datasource: String,
    token: String,
    http: Client,
}

impl EventsApiSink {
    pub fn new(api_base: &str, datasource: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: format!("{}/v0/events", api_base.trim_end_matches('/')),
            datasource: datasource.into(),
            token: token.into(),
            http: Client::new(),
        }
    }

    pub fn from_config(config: &TinybirdConfig, datasource: &str, token: &str) -> Self {
        Self::new(&config.api_base, datasource, token)
    }
}

#[async_trait]
impl RecordSink for EventsApiSink {
    async fn send(&self, record: &WeatherRecord) -> Result<()> {
        let res = self
            .http
            .post(&self.url)
            .query(&[("name", self.datasource.as_str())])
            .bearer_auth(&self.token)
            .json(record)
            .send()
            .await
            .context("Failed to send record to the Events API")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Events API rejected record for '{}' with status {}: {}",
                record.site_name,
                status,
                truncate_body(&body)
            ));
        }

        Ok(())
    }
}
