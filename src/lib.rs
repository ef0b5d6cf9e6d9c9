//! Budget, campaign and performance tracking for an ad-operations team.
//!
//! HTTP API over Postgres: client/campaign CRUD, budget and result records,
//! CSV/XLSX import with type detection and upsert, XLSX/CSV export, and
//! client/department/platform rollups.

use std::time::Duration;

use axum::{extract::DefaultBodyLimit, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

pub mod analytics;
pub mod api;
pub mod context;
pub mod db;
pub mod departments;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod report;

pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Upper bound on one import transaction
    pub import_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            import_timeout: DEFAULT_IMPORT_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_import_timeout(mut self, timeout: Duration) -> Self {
        self.import_timeout = timeout;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let upload_limit = state.max_upload_bytes;

    let routes = Router::new()
        .route(
            "/api/clients",
            get(api::clients::list_clients).post(api::clients::create_client),
        )
        .route(
            "/api/campaigns",
            get(api::campaigns::list_campaigns).post(api::campaigns::create_campaign),
        )
        .route(
            "/api/campaigns/:id",
            get(api::campaigns::get_campaign)
                .put(api::campaigns::update_campaign)
                .delete(api::campaigns::delete_campaign),
        )
        .route(
            "/api/budget-results",
            get(api::budget_results::list_budget_results)
                .post(api::budget_results::save_budget_result),
        )
        .route("/api/masters", get(api::masters::list_masters))
        .route("/api/csv-import", post(api::csv_import::import_csv))
        .route("/api/csv-import/template", get(api::csv_import::download_template))
        .route(
            "/api/import-export",
            get(api::import_export::export_sheet).post(api::import_export::import_sheet),
        )
        .route("/api/analytics/clients", get(api::analytics::clients))
        .route("/api/analytics/departments", get(api::analytics::departments))
        .route(
            "/api/analytics/departments/budget",
            get(api::analytics::department_budget),
        )
        .route("/api/analytics/platforms", get(api::analytics::platforms))
        .route("/api/analytics/monthly", get(api::analytics::monthly));

    Router::new()
        .merge(routes)
        .merge(api::health::health_routes())
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
