use common::errors::ConfigError;
use common::http_client::DEFAULT_HTTP_TIMEOUT;
use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::provider::{openweathermap, weatherstack};
use crate::service::{DEFAULT_MIN_GAP, DEFAULT_PROVIDER_TIMEOUT};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub openweather_app_id: String,
    pub openweather_url: String,
    pub weatherstack_access_key: String,
    pub weatherstack_url: String,
    pub min_gap: Duration,
    /// Per-request timeout of the upstream HTTP client.
    pub http_timeout: Duration,
    /// Outer bound on a whole provider call; must exceed `http_timeout`.
    pub provider_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_port(lookup("HTTP_PORT"))?;

        let http_timeout = non_zero_seconds(
            "HTTP_TIMEOUT_SECONDS",
            lookup("HTTP_TIMEOUT_SECONDS"),
            DEFAULT_HTTP_TIMEOUT,
        )?;
        let provider_timeout = non_zero_seconds(
            "PROVIDER_TIMEOUT_SECONDS",
            lookup("PROVIDER_TIMEOUT_SECONDS"),
            DEFAULT_PROVIDER_TIMEOUT,
        )?;
        if http_timeout >= provider_timeout {
            return Err(ConfigError::invalid(
                "HTTP_TIMEOUT_SECONDS",
                "must be shorter than PROVIDER_TIMEOUT_SECONDS",
            ));
        }

        Ok(Self {
            bind_addr: parse_or("BIND_ADDR", lookup("BIND_ADDR"), IpAddr::from([127, 0, 0, 1]))?,
            port,
            openweather_app_id: required("OPENWEATHER", lookup("OPENWEATHER"))?,
            openweather_url: lookup("OPENWEATHER_URL")
                .unwrap_or_else(|| openweathermap::DEFAULT_URL.to_string()),
            weatherstack_access_key: required("WEATHERSTACK", lookup("WEATHERSTACK"))?,
            weatherstack_url: lookup("WEATHERSTACK_URL")
                .unwrap_or_else(|| weatherstack::DEFAULT_URL.to_string()),
            min_gap: seconds("MIN_GAP_SECONDS", lookup("MIN_GAP_SECONDS"), DEFAULT_MIN_GAP)?,
            http_timeout,
            provider_timeout,
            shutdown_timeout: seconds(
                "SHUTDOWN_TIMEOUT_SECONDS",
                lookup("SHUTDOWN_TIMEOUT_SECONDS"),
                Duration::from_secs(5),
            )?,
        })
    }
}

/// Port must be non-privileged: strictly between 1024 and 65535.
fn parse_port(raw: Option<String>) -> Result<u16, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::missing("HTTP_PORT"))?;
    let port: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid("HTTP_PORT", "must be an integer"))?;

    if port <= 1024 || port >= 65535 {
        return Err(ConfigError::PortOutOfRange(port));
    }

    Ok(port as u16)
}

fn required(var: &str, raw: Option<String>) -> Result<String, ConfigError> {
    match raw {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::missing(var)),
    }
}

fn parse_or<T: FromStr>(var: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(var, format!("cannot parse {:?}", value))),
    }
}

fn seconds(var: &str, raw: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    let secs: f64 = parse_or(var, raw, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::invalid(var, "must be a non-negative number of seconds"))
}

fn non_zero_seconds(
    var: &str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let value = seconds(var, raw, default)?;
    if value.is_zero() {
        return Err(ConfigError::invalid(var, "must be greater than zero"));
    }
    Ok(value)
}
