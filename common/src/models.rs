use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

/// Normalised weather reading returned by every provider and by the API.
///
/// Field order on the wire is `wind_speed` then `temperature_degrees`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, ToSchema)]
pub struct WeatherReading {
    /// Wind speed in whatever unit the upstream provider reports.
    #[serde(serialize_with = "compact_number")]
    pub wind_speed: f64,
    /// Temperature in degrees Celsius.
    #[serde(rename = "temperature_degrees", serialize_with = "compact_number")]
    pub temperature: f64,
}

impl WeatherReading {
    pub fn new(temperature: f64, wind_speed: f64) -> Self {
        Self {
            wind_speed,
            temperature,
        }
    }
}

// Largest magnitude where every integer is exactly representable in an f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Writes integral values without a fractional part (`150` rather than `150.0`).
fn compact_number<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
