//! REST API surface
//!
//! Catalog CRUD plus analyzer proxy endpoints. Handlers return typed
//! results so integration tests can call them directly; the router only
//! does wiring.
//!
//! SQLite work runs on the blocking pool via [`blocking`]; handlers never
//! touch the connection from the async executor.

pub mod analyze;
pub mod error;
pub mod history;
pub mod repos;

pub use error::ApiError;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;

use bpfcat_core::config::ServerConfig;
use bpfcat_core::{AnalyzerClient, Database};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub analyzer: Arc<AnalyzerClient>,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl AppState {
    pub fn new(db: Database, analyzer: AnalyzerClient, server: &ServerConfig) -> Self {
        Self {
            db: Arc::new(db),
            analyzer: Arc::new(analyzer),
            default_page_size: server.page_size,
            max_page_size: server.max_page_size,
        }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/repos", post(repos::create_repo).get(repos::list_repos))
        .route("/repos/bulk", post(repos::bulk_create))
        .route("/repos/bulk/analyze", post(analyze::bulk_analyze))
        .route("/repos/categories/averages", get(analyze::category_averages))
        .route(
            "/repos/{id}",
            get(repos::get_repo)
                .patch(repos::update_repo)
                .delete(repos::delete_repo),
        )
        .route("/repos/{id}/analyze", post(analyze::analyze_repo))
        .route(
            "/repos/{id}/analyze-primitives",
            post(analyze::analyze_primitives),
        )
        .route(
            "/repos/{id}/analysis",
            get(history::analyses_for_repo),
        )
        .route("/repos/analysis/{id}", get(history::get_analysis))
        .route(
            "/repos/{id}/primitives",
            get(history::primitives_for_repo),
        )
        .route("/repos/primitives/{id}", get(history::get_primitive))
        .route(
            "/repos/{id}/tests",
            get(history::tests_for_repo).post(history::record_test),
        )
        .route("/repos/tests/{id}", get(history::get_test))
        .with_state(state)
}

async fn health(State(_state): State<AppState>) -> &'static str {
    "ok"
}

/// Run a database closure on the blocking pool
pub(crate) async fn blocking<T, F>(db: Arc<Database>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> bpfcat_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| ApiError::internal(format!("database worker join error: {}", e)))?
        .map_err(ApiError::from)
}
