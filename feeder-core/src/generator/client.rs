use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::{fmt::Debug, time::Duration};

use crate::config::TinybirdConfig;

/// Query parameters sent with every pipe request.
pub const PIPE_QUERY: [(&str, &str); 2] = [("sensor_type", "all"), ("max_results", "1000")];

/// Why a single request task did not count as a success.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The request never produced a response: connect, DNS, timeout.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("HTTP status {status}")]
    Status { status: StatusCode },
    /// Anything else, e.g. the body stream breaking after the status line.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// One GET against the target pipe.
#[async_trait]
pub trait PipeClient: Send + Sync + Debug {
    async fn query(&self) -> Result<(), RequestError>;
}

/// Issues `GET {api_base}/v0/pipes/{endpoint}.json` with a bearer token.
#[derive(Debug, Clone)]
pub struct TinybirdPipe {
    url: String,
    token: String,
    http: Client,
}

impl TinybirdPipe {
    pub fn new(
        api_base: &str,
        endpoint: &str,
        token: impl Into<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            url: pipe_url(api_base, endpoint),
            token: token.into(),
            http: builder.build()?,
        })
    }

    pub fn from_config(config: &TinybirdConfig, endpoint: &str, token: &str) -> anyhow::Result<Self> {
        Self::new(&config.api_base, endpoint, token, config.timeout())
    }
}

pub fn pipe_url(api_base: &str, endpoint: &str) -> String {
    format!("{}/v0/pipes/{}.json", api_base.trim_end_matches('/'), endpoint)
}

#[async_trait]
impl PipeClient for TinybirdPipe {
    async fn query(&self) -> Result<(), RequestError> {
        let res = self
            .http
            .get(&self.url)
            .bearer_auth(&self.token)
            .query(&PIPE_QUERY)
            .send()
            .await
            .map_err(RequestError::Transport)?;

        let status = res.status();
        if !status.is_success() {
            return Err(RequestError::Status { status });
        }

        // Drain the body so the connection goes back to the pool.
        res.bytes()
            .await
            .map_err(|e| RequestError::Unexpected(e.to_string()))?;

        Ok(())
    }
}
