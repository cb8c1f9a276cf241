//! aicat-cs library - Catalog Service
//!
//! Aggregates dataset and publication descriptions from external registries
//! into one local catalog and serves it over HTTP.

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod catalog;
pub mod connectors;
pub mod error;
pub mod linker;
pub mod pagination;

pub use catalog::{Catalog, CatalogError, DatasetLookup, PopulateReport, PopulateRequest};
pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    /// Service start, for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// With a non-empty `url_prefix` (e.g. "/aiod") every route is nested
/// under it.
pub fn build_router(state: AppState, url_prefix: &str) -> Router {
    let routes = Router::new()
        .merge(api::health_routes())
        .merge(api::node_routes())
        .merge(api::dataset_routes())
        .merge(api::publication_routes())
        .with_state(state);

    let prefix = url_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        routes
    } else if prefix.starts_with('/') {
        Router::new().nest(prefix, routes)
    } else {
        Router::new().nest(&format!("/{}", prefix), routes)
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
