use async_trait::async_trait;
use common::errors::ProviderError;
use common::http_client::{Decoder, HttpGet};
use common::models::WeatherReading;

pub mod openweathermap;
pub mod weatherstack;

pub use openweathermap::OpenWeatherMap;
pub use weatherstack::WeatherStack;

/// An upstream weather source.
///
/// Implementations translate their upstream payload into a [`WeatherReading`]
/// (temperature in Celsius, wind speed in the upstream's own unit) and reject
/// empty or unknown cities before touching the network.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_weather(&self, city: &str) -> Result<WeatherReading, ProviderError>;
}

/// Looks `city` up in a provider's own name table, after trimming and lowercasing.
pub(crate) fn lookup_city(
    table: &[(&str, &'static str)],
    city: &str,
) -> Result<&'static str, ProviderError> {
    let key = city.trim().to_lowercase();
    if key.is_empty() {
        return Err(ProviderError::MissingCity);
    }
    table
        .iter()
        .find(|(known, _)| *known == key)
        .map(|(_, upstream)| *upstream)
        .ok_or_else(|| ProviderError::UnknownCity(city.to_string()))
}

/// Fetches and decodes one upstream payload, mapping each failure to its own error.
pub(crate) async fn fetch<T>(
    http: &dyn HttpGet,
    decode: Decoder<T>,
    provider: &str,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, ProviderError> {
    let response = http.get(url, query).await?;
    if !response.is_success() {
        return Err(ProviderError::status(provider, response.status));
    }

    Ok(decode(&response.body)?)
}
