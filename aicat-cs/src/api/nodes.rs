//! Node endpoints: known nodes, per-node listing and lookup-or-fetch

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::debug;

use crate::catalog::DatasetLookup;
use crate::connectors::{DatasetMeta, NodeName};
use crate::error::ApiResult;
use crate::pagination::Pagination;
use crate::AppState;
use aicat_common::db::DatasetDescription;

/// GET /nodes
pub async fn list_nodes(State(state): State<AppState>) -> Json<Vec<NodeName>> {
    Json(state.catalog.nodes())
}

/// GET /nodes/:node/datasets
pub async fn list_node_datasets(
    State(state): State<AppState>,
    Path(node): Path<String>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<DatasetDescription>>> {
    let (offset, limit) = page.sanitized();
    let datasets = state
        .catalog
        .list_datasets_of_node(&node, offset, limit)
        .await?;
    Ok(Json(datasets))
}

/// GET /nodes/:node/datasets/:identifier
///
/// Always the registry's metadata. A stored dataset is described through
/// its node; anything else is fetched from the node and stored.
pub async fn lookup_dataset(
    State(state): State<AppState>,
    Path((node, identifier)): Path<(String, String)>,
) -> ApiResult<Json<DatasetMeta>> {
    debug!(node = %node, identifier = %identifier, "Dataset lookup");
    let meta = match state.catalog.get_dataset(&node, &identifier).await? {
        DatasetLookup::Cached(dataset) => state.catalog.describe_dataset(dataset.id).await?,
        DatasetLookup::Fetched(meta) => meta,
    };
    Ok(Json(meta))
}

/// Build node routes
pub fn node_routes() -> Router<AppState> {
    Router::new()
        .route("/nodes", get(list_nodes))
        .route("/nodes/:node/datasets", get(list_node_datasets))
        .route("/nodes/:node/datasets/:identifier", get(lookup_dataset))
}
