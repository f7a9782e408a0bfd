use super::{WeatherProvider, fetch, lookup_city};
use async_trait::async_trait;
use common::errors::{ConfigError, ProviderError};
use common::http_client::{Decoder, HttpGet, json_decoder};
use common::models::WeatherReading;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_URL: &str = "http://api.weatherstack.com/current";

const CITIES: &[(&str, &str)] = &[("melbourne", "Melbourne"), ("sydney", "Sydney")];

/// Weatherstack answers failed lookups with HTTP 200 and an `error` object,
/// so both shapes are accepted here and told apart after decoding.
#[derive(Debug, Deserialize)]
pub struct WeatherStackResponse {
    current: Option<Current>,
    success: Option<bool>,
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct Current {
    temperature: i64,
    wind_speed: i64,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    code: Option<i64>,
    info: Option<String>,
}

/// Weatherstack current-conditions adapter. Requests metric units (km/h wind).
pub struct WeatherStack {
    http: Arc<dyn HttpGet>,
    decode: Decoder<WeatherStackResponse>,
    url: String,
    access_key: String,
}

impl WeatherStack {
    pub fn new(access_key: impl Into<String>, http: Arc<dyn HttpGet>) -> Result<Self, ConfigError> {
        let access_key = access_key.into();
        if access_key.trim().is_empty() {
            return Err(ConfigError::missing("Weatherstack access key"));
        }

        Ok(Self {
            http,
            decode: json_decoder(),
            url: DEFAULT_URL.to_string(),
            access_key,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_decoder(mut self, decode: Decoder<WeatherStackResponse>) -> Self {
        self.decode = decode;
        self
    }
}

fn into_reading(payload: WeatherStackResponse) -> Result<WeatherReading, ProviderError> {
    if let Some(err) = payload.error {
        return Err(ProviderError::upstream(format!(
            "weatherstack error {}: {}",
            err.code.unwrap_or_default(),
            err.info.unwrap_or_else(|| "no detail".to_string())
        )));
    }
    if payload.success == Some(false) {
        return Err(ProviderError::upstream("weatherstack reported failure"));
    }

    let current = payload
        .current
        .ok_or_else(|| ProviderError::upstream("weatherstack payload has no current block"))?;

    Ok(WeatherReading::new(
        current.temperature as f64,
        current.wind_speed as f64,
    ))
}

#[async_trait]
impl WeatherProvider for WeatherStack {
    fn name(&self) -> &str {
        "weatherstack"
    }

    #[instrument(skip(self), fields(provider = "weatherstack"))]
    async fn get_weather(&self, city: &str) -> Result<WeatherReading, ProviderError> {
        let upstream_city = lookup_city(CITIES, city)?;

        let query = [
            ("query", upstream_city),
            ("access_key", self.access_key.as_str()),
            ("units", "m"),
        ];
        let payload = fetch(
            self.http.as_ref(),
            self.decode,
            self.name(),
            &self.url,
            &query,
        )
        .await?;

        let reading = into_reading(payload)?;
        debug!(?reading, "Decoded payload");

        Ok(reading)
    }
}
