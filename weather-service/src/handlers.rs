use axum::{
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::{Query, QueryRejection};
use common::errors::AppError;
use common::models::WeatherReading;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::service::WeatherService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
}

#[derive(Deserialize)]
pub struct WeatherQuery {
    #[serde(default)]
    pub city: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health check")
    )
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "weather-service" }))
}

#[utoipa::path(
    get,
    path = "/v1/weather",
    params(
        ("city" = String, Query, description = "City name, case-insensitive (melbourne, sydney)")
    ),
    responses(
        (status = 200, description = "Latest known reading for the city", body = WeatherReading),
        (status = 400, description = "Missing or unknown city", body = String, content_type = "text/plain"),
        (status = 405, description = "Method other than GET", body = String, content_type = "text/plain")
    ),
    tag = "weather"
)]
pub async fn weather(
    State(state): State<AppState>,
    method: Method,
    query: Result<Query<WeatherQuery>, QueryRejection>,
) -> Response {
    // An unparseable query string is treated the same as a missing city.
    let city = query.ok().and_then(|Query(q)| q.city.into_iter().next());
    info!(%method, city = ?city, "Weather request received");

    let result = state
        .service
        .handle_weather_request(&method, city.as_deref())
        .await;

    render(result)
}

/// Turns the service outcome into the wire response.
///
/// Serialization happens before any bytes are written so a failure becomes a
/// clean 500 rather than a truncated 200.
pub fn render(result: Result<WeatherReading, AppError>) -> Response {
    let body = result.and_then(|reading| {
        serde_json::to_vec(&reading).map_err(|e| AppError::Serialization(e.to_string()))
    });

    match body {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(err) => {
            if let AppError::Serialization(reason) = &err {
                error!(%reason, "Failed to serialize weather reading");
            }
            err.into_response()
        }
    }
}
