use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::provider::CurrentWeather;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Flat weather record forwarded downstream, one per city per run.
///
/// Field names on the wire match the `incoming_weather_data` datasource schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub timestamp: String,
    pub site_name: String,
    #[serde(rename = "temp_f")]
    pub temperature: f64,
    pub precip: f64,
    pub humidity: u32,
    pub pressure: u32,
    pub wind_speed: f64,
    pub wind_dir: u32,
    pub clouds: u32,
    pub description: String,
}

impl WeatherRecord {
    pub fn from_observation<Tz>(city: &str, obs: &CurrentWeather, tz: &Tz) -> Result<Self>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let description = obs
            .weather
            .first()
            .map(|w| w.description.clone())
            .ok_or_else(|| anyhow!("OpenWeather response for '{city}' has an empty weather list"))?;

        Ok(Self {
            timestamp: format_timestamp(obs.dt, tz)?,
            site_name: city.to_string(),
            temperature: obs.main.temp,
            precip: precipitation(obs),
            humidity: obs.main.humidity,
            pressure: obs.main.pressure,
            wind_speed: obs.wind.speed,
            wind_dir: obs.wind.deg,
            clouds: obs.clouds.all,
            description,
        })
    }
}

/// Where a record came from; one row of the location table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationMetadata {
    pub site_name: String,
    pub site_name_owm: String,
    pub lat: f64,
    pub long: f64,
    /// Shift in seconds from UTC.
    pub timezone: i32,
}

impl LocationMetadata {
    pub fn from_observation(city: &str, obs: &CurrentWeather) -> Self {
        Self {
            site_name: city.to_string(),
            site_name_owm: obs.name.clone(),
            lat: obs.coord.lat,
            long: obs.coord.lon,
            timezone: obs.timezone,
        }
    }
}

/// Rain volume over the last hour. OpenWeather drops `rain` when it's dry,
/// which is a measurement of zero, not missing data.
pub fn precipitation(obs: &CurrentWeather) -> f64 {
    obs.rain.as_ref().and_then(|r| r.one_hour).unwrap_or(0.0)
}

/// Format Unix seconds as `%Y-%m-%d %H:%M:%S` in `tz`.
pub fn format_timestamp<Tz>(unix_seconds: i64, tz: &Tz) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let utc = DateTime::from_timestamp(unix_seconds, 0)
        .ok_or_else(|| anyhow!("Timestamp {unix_seconds} is out of range"))?;

    Ok(utc.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string())
}
