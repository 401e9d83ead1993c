pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::benefits::OrmBenefitsService;
use crate::services::centers::OrmCentersService;
use crate::services::insertion::ErpInsertionService;
use crate::services::{BenefitsService, BenefitsUploadService, CentersService};
use crate::utils::keyed_mutex::KeyedMutex;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Headroom over `max_file_size` for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::benefits::upload_benefits_file,
        api::handlers::benefits::get_benefit_excel,
        api::handlers::benefits::get_benefits,
        api::handlers::centers::get_centers,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::benefits::UploadForm,
            api::handlers::health::HealthResponse,
            models::Environment,
            models::InsertionScript,
            models::BenefitResponse,
            models::CenterResponse,
            models::BenefitPage,
            models::CenterPage,
        )
    ),
    tags(
        (name = "Uploads", description = "Benefits data load"),
        (name = "Example Excel benefits", description = "Upload template"),
        (name = "ORMA_BENEFITS", description = "Benefits catalogue"),
        (name = "ORMA_CENTERS", description = "Centers catalogue"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub benefits: Arc<dyn BenefitsService>,
    pub centers: Arc<dyn CentersService>,
    pub benefits_upload: Arc<dyn BenefitsUploadService>,
    pub staging_locks: KeyedMutex,
}

impl AppState {
    /// State wired to the ORM-backed services and the default insertion routine.
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        Self {
            benefits: Arc::new(OrmBenefitsService::new(db.clone())),
            centers: Arc::new(OrmCentersService::new(db.clone())),
            benefits_upload: Arc::new(ErpInsertionService::new(
                config.erp_interface_table.clone(),
            )),
            staging_locks: KeyedMutex::new(),
            db,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/create/benefits/upload",
            post(api::handlers::benefits::upload_benefits_file).layer(DefaultBodyLimit::max(
                state.config.max_file_size + MULTIPART_OVERHEAD,
            )),
        )
        .route(
            "/benefits/example/excel",
            get(api::handlers::benefits::get_benefit_excel),
        )
        .route("/benefits", get(api::handlers::benefits::get_benefits))
        .route("/centers", get(api::handlers::centers::get_centers))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
