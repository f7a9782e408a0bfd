use crate::cache::RateLimitCache;
use crate::provider::WeatherProvider;
use axum::http::Method;
use common::errors::{AppError, ConfigError};
use common::models::WeatherReading;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{Duration, Instant, timeout};
use tracing::{debug, error, info, instrument, warn};

/// Minimum time between two upstream lookups for the same city.
pub const DEFAULT_MIN_GAP: Duration = Duration::from_secs(3);

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_CITIES: &[&str] = &["melbourne", "sydney"];

/// Answers weather requests from an ordered list of providers, fronted by a
/// per-city rate-limit cache.
///
/// Within `min_gap` of the last successful lookup for a city the cached
/// reading is served without contacting any provider. Otherwise providers are
/// tried in order and the first success wins. When every provider fails the
/// previous (possibly zero) reading is still returned; there is no staleness
/// marker in the response, callers only see the failure in the logs.
///
/// The cache lock is held across provider calls, so at most one upstream
/// request is in flight for the whole service.
pub struct WeatherService {
    providers: Vec<Arc<dyn WeatherProvider>>,
    cache: RateLimitCache,
    known_cities: HashSet<String>,
    min_gap: Duration,
    provider_timeout: Duration,
}

impl WeatherService {
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>) -> Result<Self, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        Ok(Self {
            providers,
            cache: RateLimitCache::new(),
            known_cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            min_gap: DEFAULT_MIN_GAP,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        })
    }

    pub fn with_min_gap(mut self, min_gap: Duration) -> Self {
        self.min_gap = min_gap;
        self
    }

    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    pub fn with_known_cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.known_cities = cities
            .into_iter()
            .map(|c| normalize_city(c.as_ref()))
            .collect();
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Validates the request and returns the reading to serve.
    ///
    /// Validation failures never take the cache lock or reach a provider.
    #[instrument(skip(self))]
    pub async fn handle_weather_request(
        &self,
        method: &Method,
        city: Option<&str>,
    ) -> Result<WeatherReading, AppError> {
        if *method != Method::GET {
            return Err(AppError::BadMethod);
        }

        let raw = city.ok_or(AppError::MissingCity)?;
        let city = normalize_city(raw);
        if !self.known_cities.contains(&city) {
            return Err(AppError::UnknownCity(raw.to_string()));
        }

        Ok(self.current_reading(&city).await)
    }

    async fn current_reading(&self, city: &str) -> WeatherReading {
        let mut cache = self.cache.lock().await;

        if cache.is_fresh(city, self.min_gap, Instant::now()) {
            debug!(city, "Serving cached reading");
            return cache.reading(city);
        }

        for provider in &self.providers {
            match timeout(self.provider_timeout, provider.get_weather(city)).await {
                Ok(Ok(reading)) => {
                    info!(city, provider = provider.name(), "Fetched fresh reading");
                    cache.record(city, reading, Instant::now());
                    return reading;
                }
                Ok(Err(err)) => {
                    warn!(city, provider = provider.name(), error = %err, "Provider failed, trying next");
                }
                Err(_) => {
                    warn!(
                        city,
                        provider = provider.name(),
                        timeout_ms = self.provider_timeout.as_millis() as u64,
                        "Provider timed out, trying next"
                    );
                }
            }
        }

        // Known trade-off: total provider failure still answers 200 with the old reading.
        error!(city, "All providers failed, serving previous reading");
        cache.reading(city)
    }
}

pub fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::errors::ProviderError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider double that replays scripted outcomes and counts calls.
    struct StubProvider {
        name: &'static str,
        script: Mutex<Vec<Option<WeatherReading>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl StubProvider {
        fn new(name: &'static str, script: Vec<Option<WeatherReading>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                delay: None,
            })
        }

        fn ok(name: &'static str, reading: WeatherReading) -> Arc<Self> {
            Self::new(name, vec![Some(reading); 16])
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Self::new(name, vec![None; 16])
        }

        fn hanging(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(vec![Some(WeatherReading::new(99.0, 99.0))]),
                calls: AtomicUsize::new(0),
                delay: Some(Duration::from_secs(3600)),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn get_weather(&self, _city: &str) -> Result<WeatherReading, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().remove(0);
            next.ok_or_else(|| ProviderError::upstream("scripted failure"))
        }
    }

    fn service(providers: Vec<Arc<StubProvider>>) -> WeatherService {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn WeatherProvider>)
            .collect();
        WeatherService::new(providers).unwrap()
    }

    fn get() -> Method {
        Method::GET
    }

    #[test]
    fn new_requires_a_provider() {
        let err = WeatherService::new(Vec::new()).err().unwrap();
        assert_eq!(err, ConfigError::NoProviders);
        assert_eq!(err.to_string(), "must have at least one provider");
    }

    #[tokio::test]
    async fn wrong_method_is_rejected_without_provider_calls() {
        let a = StubProvider::ok("a", WeatherReading::new(1.0, 1.0));
        let svc = service(vec![a.clone()]);

        for method in [Method::POST, Method::PUT, Method::DELETE, Method::HEAD] {
            let err = svc
                .handle_weather_request(&method, Some("melbourne"))
                .await
                .unwrap_err();
            assert_eq!(err, AppError::BadMethod);
        }
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn missing_or_unknown_city_never_reaches_providers() {
        let a = StubProvider::ok("a", WeatherReading::new(1.0, 1.0));
        let svc = service(vec![a.clone()]);

        assert_eq!(
            svc.handle_weather_request(&get(), None).await.unwrap_err(),
            AppError::MissingCity
        );
        assert_eq!(
            svc.handle_weather_request(&get(), Some("fake"))
                .await
                .unwrap_err(),
            AppError::UnknownCity("fake".to_string())
        );
        assert_eq!(
            svc.handle_weather_request(&get(), Some(""))
                .await
                .unwrap_err(),
            AppError::UnknownCity(String::new())
        );
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn city_is_trimmed_and_case_folded() {
        let a = StubProvider::ok("a", WeatherReading::new(100.0, 150.0));
        let svc = service(vec![a.clone()]);

        let reading = svc
            .handle_weather_request(&get(), Some("  MELBOURNE "))
            .await
            .unwrap();
        assert_eq!(reading, WeatherReading::new(100.0, 150.0));
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_within_gap_is_served_from_cache() {
        let a = StubProvider::new(
            "a",
            vec![
                Some(WeatherReading::new(10.0, 1.0)),
                Some(WeatherReading::new(20.0, 2.0)),
            ],
        );
        let svc = service(vec![a.clone()]);

        let first = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = svc
            .handle_weather_request(&get(), Some("Melbourne"))
            .await
            .unwrap();

        assert_eq!(first, WeatherReading::new(10.0, 1.0));
        assert_eq!(second, first);
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_expires_after_gap() {
        let a = StubProvider::new(
            "a",
            vec![
                Some(WeatherReading::new(10.0, 1.0)),
                Some(WeatherReading::new(20.0, 2.0)),
            ],
        );
        let svc = service(vec![a.clone()]);

        svc.handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();
        tokio::time::advance(DEFAULT_MIN_GAP).await;
        let second = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();

        assert_eq!(second, WeatherReading::new(20.0, 2.0));
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cities_are_cached_independently() {
        let a = StubProvider::new(
            "a",
            vec![
                Some(WeatherReading::new(10.0, 1.0)),
                Some(WeatherReading::new(20.0, 2.0)),
            ],
        );
        let svc = service(vec![a.clone()]);

        let melbourne = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();
        let sydney = svc
            .handle_weather_request(&get(), Some("sydney"))
            .await
            .unwrap();

        assert_eq!(melbourne, WeatherReading::new(10.0, 1.0));
        assert_eq!(sydney, WeatherReading::new(20.0, 2.0));
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_over_and_keeps_last_good_reading() {
        let a = StubProvider::failing("a");
        let b = StubProvider::new("b", vec![Some(WeatherReading::new(30.0, 3.0)), None]);
        let svc = service(vec![a.clone(), b.clone()]);

        let first = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();
        assert_eq!(first, WeatherReading::new(30.0, 3.0));

        tokio::time::advance(DEFAULT_MIN_GAP).await;
        let second = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();

        assert_eq!(second, WeatherReading::new(30.0, 3.0));
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 2);
    }

    #[tokio::test]
    async fn first_success_stops_iteration() {
        let a = StubProvider::ok("a", WeatherReading::new(1.0, 1.0));
        let b = StubProvider::ok("b", WeatherReading::new(2.0, 2.0));
        let svc = service(vec![a.clone(), b.clone()]);

        let reading = svc
            .handle_weather_request(&get(), Some("sydney"))
            .await
            .unwrap();

        assert_eq!(reading, WeatherReading::new(1.0, 1.0));
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn all_failing_returns_zero_reading_on_first_request() {
        let a = StubProvider::failing("a");
        let b = StubProvider::failing("b");
        let svc = service(vec![a.clone(), b.clone()]);

        let reading = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();

        assert_eq!(reading, WeatherReading::default());
        assert_eq!((a.calls(), b.calls()), (1, 1));
    }

    #[tokio::test]
    async fn failed_refresh_does_not_start_a_new_gap() {
        let a = StubProvider::new("a", vec![None, Some(WeatherReading::new(5.0, 5.0))]);
        let svc = service(vec![a.clone()]);

        svc.handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();
        let second = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();

        assert_eq!(second, WeatherReading::new(5.0, 5.0));
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_is_abandoned_after_timeout() {
        let slow = StubProvider::hanging("slow");
        let b = StubProvider::ok("b", WeatherReading::new(7.0, 8.0));
        let svc = service(vec![slow.clone(), b.clone()])
            .with_provider_timeout(Duration::from_millis(500));

        let reading = svc
            .handle_weather_request(&get(), Some("melbourne"))
            .await
            .unwrap();

        assert_eq!(reading, WeatherReading::new(7.0, 8.0));
        assert_eq!(slow.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_burst_costs_one_upstream_call() {
        let a = StubProvider::ok("a", WeatherReading::new(12.0, 3.0));
        let svc = Arc::new(service(vec![a.clone()]));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.handle_weather_request(&Method::GET, Some("melbourne"))
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), WeatherReading::new(12.0, 3.0));
        }

        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn custom_known_cities_are_normalized() {
        let a = StubProvider::ok("a", WeatherReading::new(1.0, 1.0));
        let svc = service(vec![a]).with_known_cities([" Perth "]);

        assert!(
            svc.handle_weather_request(&get(), Some("perth"))
                .await
                .is_ok()
        );
        assert_eq!(
            svc.handle_weather_request(&get(), Some("melbourne"))
                .await
                .unwrap_err(),
            AppError::UnknownCity("melbourne".to_string())
        );
    }

    #[test]
    fn provider_names_keep_order() {
        let svc = service(vec![StubProvider::failing("a"), StubProvider::failing("b")]);
        assert_eq!(svc.provider_names(), vec!["a", "b"]);
    }
}
