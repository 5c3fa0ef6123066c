//! Core library for the `exercise-api` and `weather-cron` tools.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The open-loop request generator used to exercise a Tinybird pipe
//! - The OpenWeather source, record shaping, and sinks for the weather job
//! - The location table writer
//!
//! It is used by `feeder-cli`, but can also be reused by other binaries or services.

pub mod collector;
pub mod config;
pub mod generator;
pub mod model;
pub mod provider;
pub mod sink;

pub use collector::{Collector, CollectorReport};
pub use config::{Config, FailurePolicy, Units};
pub use generator::{Generator, GeneratorSummary, Rpm};
pub use model::{LocationMetadata, WeatherRecord};
pub use provider::WeatherSource;
pub use sink::{EventsApiSink, RecordSink, StdoutSink};
