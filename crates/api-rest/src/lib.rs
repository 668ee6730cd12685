//! # API REST
//!
//! REST API implementation for the telecare consultation core.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, CORS, server-sent queue events)
//!
//! The caller's identity arrives in `x-actor-*` headers (see [`api_shared::auth`]); every
//! decision about what that caller may do is left to [`ConsultationService`].

#![warn(rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod session;

pub use error::ApiError;
pub use session::Caller;

use axum::routing::{get, post, put};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use telecare_core::config::{audit_read_limit_from_env_value, store_kind_from_env_value};
use telecare_core::constants::{
    DEFAULT_ADULT_AGE_YEARS, DEFAULT_DATA_DIR, DEFAULT_QUEUE_CHANNEL_CAPACITY,
};
use telecare_core::{ConsultationService, CoreConfig, StaticDirectory};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    service: Arc<ConsultationService>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: Arc<ConsultationService>, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }

    /// Builds the service from environment variables.
    ///
    /// # Environment Variables
    /// - `TELECARE_DATA_DIR`: data directory (default: `telecare_data`)
    /// - `TELECARE_STORE`: `file` or `memory` (default: `file`)
    /// - `TELECARE_AUDIT_READ_LIMIT`: maximum audit events per read
    /// - `API_KEY`: when set, required in `x-api-key`
    ///
    /// # Errors
    /// Returns an error if a value is invalid, the directory file cannot be parsed, or the
    /// store cannot be opened.
    pub async fn from_env() -> anyhow::Result<Self> {
        let data_dir = std::env::var("TELECARE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
        let store_kind = store_kind_from_env_value(std::env::var("TELECARE_STORE").ok())?;
        let audit_read_limit =
            audit_read_limit_from_env_value(std::env::var("TELECARE_AUDIT_READ_LIMIT").ok())?;

        let cfg = Arc::new(CoreConfig::new(
            data_dir,
            audit_read_limit,
            DEFAULT_QUEUE_CHANNEL_CAPACITY,
            DEFAULT_ADULT_AGE_YEARS,
        )?);
        let directory = Arc::new(StaticDirectory::load(&cfg.directory_file())?);
        let service = ConsultationService::open(cfg, store_kind, directory).await?;

        let api_key = std::env::var("API_KEY").ok();
        if api_key.is_none() {
            tracing::warn!("API_KEY not set; requests are not key-checked");
        }
        Ok(Self::new(Arc::new(service), api_key))
    }

    pub fn service(&self) -> &ConsultationService {
        &self.service
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::red_flags,
        handlers::submit_consultation,
        handlers::list_queue,
        handlers::queue_events,
        handlers::claim,
        handlers::save_draft,
        handlers::complete,
        handlers::cancel,
        handlers::add_addendum,
        handlers::clinician_chart,
        handlers::patient_chart,
        handlers::audit_events,
    ),
    components(schemas(
        api_shared::HealthRes,
        dto::ErrorRes,
        dto::SuccessRes,
        dto::RedFlagRes,
        dto::RedFlagCatalogueRes,
        dto::SubmitConsultationReq,
        dto::SubmitConsultationRes,
        dto::QueueEntryRes,
        dto::ListQueueRes,
        dto::VitalsReq,
        dto::ClinicalFieldsReq,
        dto::AddAddendumReq,
        dto::AddAddendumRes,
        dto::ClinicianChartRes,
        dto::PatientChartRes,
        dto::AuditEventsRes,
    ))
)]
pub struct ApiDoc;

/// All routes plus Swagger UI, with permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/red-flags", get(handlers::red_flags))
        .route("/consultations", post(handlers::submit_consultation))
        .route("/queue", get(handlers::list_queue))
        .route("/queue/events", get(handlers::queue_events))
        .route("/consultations/:id/claim", post(handlers::claim))
        .route("/consultations/:id/draft", put(handlers::save_draft))
        .route("/consultations/:id/complete", post(handlers::complete))
        .route("/consultations/:id/cancel", post(handlers::cancel))
        .route("/consultations/:id/addenda", post(handlers::add_addendum))
        .route("/consultations/:id/chart", get(handlers::clinician_chart))
        .route("/consultations/:id/summary", get(handlers::patient_chart))
        .route("/consultations/:id/audit", get(handlers::audit_events))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
