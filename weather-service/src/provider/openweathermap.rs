use super::{WeatherProvider, fetch, lookup_city};
use async_trait::async_trait;
use common::errors::{ConfigError, ProviderError};
use common::http_client::{Decoder, HttpGet, json_decoder};
use common::models::WeatherReading;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

const CITIES: &[(&str, &str)] = &[("melbourne", "melbourne,AU"), ("sydney", "sydney,AU")];

#[derive(Debug, Deserialize)]
pub struct OpenWeatherResponse {
    main: MainBlock,
    wind: WindBlock,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: f64,
}

/// OpenWeatherMap current-weather adapter. Requests metric units.
pub struct OpenWeatherMap {
    http: Arc<dyn HttpGet>,
    decode: Decoder<OpenWeatherResponse>,
    url: String,
    app_id: String,
}

impl OpenWeatherMap {
    pub fn new(app_id: impl Into<String>, http: Arc<dyn HttpGet>) -> Result<Self, ConfigError> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(ConfigError::missing("OpenWeatherMap app id"));
        }

        Ok(Self {
            http,
            decode: json_decoder(),
            url: DEFAULT_URL.to_string(),
            app_id,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_decoder(mut self, decode: Decoder<OpenWeatherResponse>) -> Self {
        self.decode = decode;
        self
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMap {
    fn name(&self) -> &str {
        "openweathermap"
    }

    #[instrument(skip(self), fields(provider = "openweathermap"))]
    async fn get_weather(&self, city: &str) -> Result<WeatherReading, ProviderError> {
        let upstream_city = lookup_city(CITIES, city)?;

        let query = [
            ("q", upstream_city),
            ("appid", self.app_id.as_str()),
            ("units", "metric"),
        ];
        let payload = fetch(
            self.http.as_ref(),
            self.decode,
            self.name(),
            &self.url,
            &query,
        )
        .await?;

        debug!(temp = payload.main.temp, wind = payload.wind.speed, "Decoded payload");

        Ok(WeatherReading::new(payload.main.temp, payload.wind.speed))
    }
}
