pub mod api;
pub mod config;
pub mod infrastructure;
pub mod secrets;
pub mod services;

use crate::config::AppConfig;
use crate::infrastructure::clients::ClientProvider;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::process::process_document,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::process::ProcessDocumentRequest,
            api::handlers::process::ProcessDocumentResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "ocr", description = "Document OCR endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub clients: Arc<dyn ClientProvider>,
    /// Serialises batch and single-document runs
    pub run_lock: Arc<Mutex<()>>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/process_document",
            post(api::handlers::process::process_document),
        )
        // Path used by the Functions host
        .route(
            "/api/process_document",
            post(api::handlers::process::process_document),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
