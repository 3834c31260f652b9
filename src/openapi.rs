use utoipa::OpenApi;

use crate::control::{SinkEntry, SinkState};
use crate::handlers::control::ControlResponse;

#[derive(OpenApi)]
#[openapi(
    paths(health_handler, crate::handlers::control::control),
    components(schemas(ControlResponse, SinkEntry, SinkState)),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Control", description = "Gateway and sink control commands published over MQTT"),
    ),
    info(
        title = "Wirepas Backend Client Control API",
        version = "0.4.0",
        description = "Turns HTTP requests into gateway requests for every known sink",
    ),
    servers(
        (url = "/", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String),
    ),
    tag = "Health"
)]
pub async fn health_handler() -> &'static str {
    "Working!"
}
