pub mod cache;
pub mod config;
pub mod handlers;
pub mod openapi;
pub mod provider;
pub mod service;

use axum::{
    Router,
    routing::{any, get},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::AppState;
use crate::service::WeatherService;

/// Builds the HTTP router around an already-configured service.
///
/// `/v1/weather` accepts every method; the service rejects non-GET requests
/// itself so the 405 body is the one callers expect.
pub fn router(service: Arc<WeatherService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/weather", any(handlers::weather))
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}
