use async_trait::async_trait;
use std::fmt::Debug;

use crate::{Config, provider::openweather::OpenWeatherProvider};

pub mod openweather;

pub use openweather::CurrentWeather;

/// Source of current weather conditions for a named city.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(&self, city: &str) -> anyhow::Result<CurrentWeather>;
}

/// Construct the OpenWeather source from config.
pub fn weather_source_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherSource>> {
    let api_key = config.openweather_api_key()?;
    Ok(Box::new(OpenWeatherProvider::from_config(&config.openweather, api_key)))
}
