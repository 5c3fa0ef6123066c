use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{OpenWeatherConfig, Units};

use super::WeatherSource;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    units: Units,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn with_base_url(api_key: String, base_url: impl Into<String>, units: Units) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            units,
            http: Client::new(),
        }
    }

    pub fn from_config(config: &OpenWeatherConfig, api_key: &str) -> Self {
        Self::with_base_url(api_key.to_owned(), config.api_base.clone(), config.units)
    }

    async fn fetch_current(&self, city: &str) -> Result<CurrentWeather> {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather for '{city}'"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather current response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather request for '{}' failed with status {}: {}",
                city,
                status,
                truncate_body(&body),
            ));
        }

        debug!(city, bytes = body.len(), "OpenWeather response received");

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse OpenWeather JSON for '{city}'"))
    }
}

/// Current-conditions payload, reduced to the fields the collector reads.
///
/// Every field except `rain` is required: OpenWeather omits `rain` entirely
/// when it isn't raining.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    pub name: String,
    pub dt: i64,
    pub timezone: i32,
    pub coord: OwCoord,
    pub main: OwMain,
    pub wind: OwWind,
    pub clouds: OwClouds,
    pub weather: Vec<OwWeather>,
    #[serde(default)]
    pub rain: Option<OwRain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwMain {
    pub temp: f64,
    pub humidity: u32,
    pub pressure: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWind {
    pub speed: f64,
    pub deg: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwClouds {
    pub all: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWeather {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwRain {
    #[serde(rename = "1h")]
    pub one_hour: Option<f64>,
}

#[async_trait]
impl WeatherSource for OpenWeatherProvider {
    async fn current(&self, city: &str) -> Result<CurrentWeather> {
        self.fetch_current(city).await
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    pub(crate) fn payload(name: &str, lat: f64, lon: f64, timezone: i32) -> Value {
        json!({
            "coord": { "lon": lon, "lat": lat },
            "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }],
            "main": { "temp": 71.6, "feels_like": 70.9, "pressure": 1015, "humidity": 48 },
            "wind": { "speed": 9.22, "deg": 250 },
            "clouds": { "all": 0 },
            "dt": 1_700_000_000,
            "timezone": timezone,
            "name": name,
            "cod": 200
        })
    }

    #[tokio::test]
    async fn sends_city_key_and_units() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "New York"))
            .and(query_param("appid", "KEY"))
            .and(query_param("units", "imperial"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(payload("New York", 40.71, -74.01, -18000)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri(), Units::Imperial);
        let current = provider.current("New York").await.unwrap();

        assert_eq!(current.name, "New York");
        assert_eq!(current.timezone, -18000);
        assert_eq!(current.coord.lat, 40.71);
        assert!(current.rain.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"cod":"404","message":"city not found"}"#))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri(), Units::Metric);
        let err = provider.current("Atlantis").await.unwrap_err().to_string();

        assert!(err.contains("404"));
        assert!(err.contains("city not found"));
    }

    #[tokio::test]
    async fn missing_required_key_fails_to_parse() {
        let server = MockServer::start().await;
        let mut body = payload("Boston", 42.36, -71.06, -18000);
        body.as_object_mut().unwrap().remove("coord");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri(), Units::Imperial);
        let err = provider.current("Boston").await.unwrap_err();

        assert!(err.to_string().contains("Failed to parse OpenWeather JSON"));
    }

    #[test]
    fn rain_one_hour_is_read() {
        let mut body = payload("Seattle", 47.6, -122.3, -28800);
        body["rain"] = json!({ "1h": 2.5 });

        let current: CurrentWeather = serde_json::from_value(body).unwrap();
        assert_eq!(current.rain.and_then(|r| r.one_hour), Some(2.5));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(150);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
    }
}
