use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use common::models::WeatherReading;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::weather,
    ),
    components(schemas(WeatherReading)),
    tags(
        (name = "weather", description = "Current weather by city"),
    ),
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
