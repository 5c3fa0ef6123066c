use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

/// Env var holding the Tinybird bearer token.
pub const TINYBIRD_TOKEN_VAR: &str = "TINYBIRD_TOKEN";
/// Env var holding the OpenWeatherMap API key.
pub const OPENWEATHER_TOKEN_VAR: &str = "OPENWEATHERMAP_TOKEN";
/// Env var pointing at an alternate config file.
pub const CONFIG_PATH_VAR: &str = "PIPE_FEEDER_CONFIG";

/// Tinybird credentials and endpoint, shared by both tools.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TinybirdConfig {
    pub token: Option<String>,
    pub api_base: String,
    /// Per-request timeout. Absent means the HTTP client default (none).
    pub timeout_secs: Option<u64>,
}

impl Default for TinybirdConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.tinybird.co".to_string(),
            timeout_secs: None,
        }
    }
}

impl TinybirdConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
            Units::Standard => "standard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenWeatherConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub units: Units,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "http://api.openweathermap.org".to_string(),
            units: Units::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Upper bound on requests in flight at once.
    pub max_in_flight: usize,
    /// Grace period for in-flight requests once the generator is stopped.
    pub drain_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 1000,
            drain_timeout_secs: 5,
        }
    }
}

impl GeneratorConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// What the collector does when a single city cannot be fetched or shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the city and carry on with the rest of the batch.
    #[default]
    Skip,
    /// Stop the batch; nothing is written.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub cities_file: PathBuf,
    pub output_file: PathBuf,
    pub pace_ms: u64,
    pub forward_events: bool,
    pub events_datasource: String,
    pub on_error: FailurePolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cities_file: PathBuf::from("cities.csv"),
            output_file: PathBuf::from("location_data.csv"),
            pace_ms: 250,
            forward_events: false,
            events_datasource: "incoming_weather_data".to_string(),
            on_error: FailurePolicy::default(),
        }
    }
}

impl CollectorConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [tinybird]
/// token = "..."
///
/// [openweather]
/// api_key = "..."
/// units = "imperial"
///
/// [collector]
/// on_error = "skip"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub tinybird: TinybirdConfig,
    pub openweather: OpenWeatherConfig,
    pub generator: GeneratorConfig,
    pub collector: CollectorConfig,
}

impl Config {
    /// Load config from disk (or defaults if absent), then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(p) => PathBuf::from(p),
            None => Self::config_file_path()?,
        };

        let cfg = Self::load_from(&path)?;
        Ok(cfg.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Load config from an explicit path, or return an empty default if it doesn't exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Credentials from the environment win over whatever the file holds.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(TINYBIRD_TOKEN_VAR).filter(|t| !t.is_empty()) {
            self.tinybird.token = Some(token);
        }
        if let Some(key) = lookup(OPENWEATHER_TOKEN_VAR).filter(|k| !k.is_empty()) {
            self.openweather.api_key = Some(key);
        }
        self
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "pipe-feeder", "pipe-feeder")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn tinybird_token(&self) -> Result<&str> {
        self.tinybird.token.as_deref().ok_or_else(|| {
            anyhow!(
                "No Tinybird token configured.\n\
                 Hint: export {TINYBIRD_TOKEN_VAR} or set `token` under [tinybird] in the config file."
            )
        })
    }

    pub fn openweather_api_key(&self) -> Result<&str> {
        self.openweather.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No OpenWeatherMap API key configured.\n\
                 Hint: export {OPENWEATHER_TOKEN_VAR} or set `api_key` under [openweather] in the config file."
            )
        })
    }
}
