//! Dataset endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::parse_id;
use crate::connectors::DatasetMeta;
use crate::error::ApiResult;
use crate::pagination::Pagination;
use crate::AppState;
use aicat_common::db::{DatasetDescription, NewDataset, Publication};

/// GET /datasets
pub async fn list_datasets(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<DatasetDescription>>> {
    let (offset, limit) = page.sanitized();
    Ok(Json(state.catalog.list_datasets_page(offset, limit).await?))
}

/// POST /datasets
pub async fn register_dataset(
    State(state): State<AppState>,
    Json(dataset): Json<NewDataset>,
) -> ApiResult<Json<DatasetDescription>> {
    Ok(Json(state.catalog.register_dataset(&dataset).await?))
}

/// GET /datasets/:id
///
/// Stored description enriched through the dataset's node.
pub async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DatasetMeta>> {
    let id = parse_id(&id, "Dataset")?;
    Ok(Json(state.catalog.describe_dataset(id).await?))
}

/// PUT /datasets/:id
pub async fn update_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(dataset): Json<NewDataset>,
) -> ApiResult<Json<DatasetDescription>> {
    let id = parse_id(&id, "Dataset")?;
    Ok(Json(state.catalog.update_dataset(id, &dataset).await?))
}

/// DELETE /datasets/:id
pub async fn delete_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "Dataset")?;
    state.catalog.delete_dataset(id).await?;
    Ok(StatusCode::OK)
}

/// GET /datasets/:id/publications
pub async fn list_dataset_publications(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Publication>>> {
    let id = parse_id(&id, "Dataset")?;
    Ok(Json(state.catalog.publications_of_dataset(id).await?))
}

/// POST /datasets/:id/publications/:publication_id
pub async fn link_publication(
    State(state): State<AppState>,
    Path((id, publication_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<Publication>>> {
    let id = parse_id(&id, "Dataset")?;
    let publication_id = parse_id(&publication_id, "Publication")?;
    Ok(Json(state.catalog.link(id, publication_id).await?))
}

/// DELETE /datasets/:id/publications/:publication_id
pub async fn unlink_publication(
    State(state): State<AppState>,
    Path((id, publication_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<Publication>>> {
    let id = parse_id(&id, "Dataset")?;
    let publication_id = parse_id(&publication_id, "Publication")?;
    Ok(Json(state.catalog.unlink(id, publication_id).await?))
}

/// Build dataset routes
pub fn dataset_routes() -> Router<AppState> {
    Router::new()
        .route("/datasets", get(list_datasets).post(register_dataset))
        .route(
            "/datasets/:id",
            get(get_dataset).put(update_dataset).delete(delete_dataset),
        )
        .route("/datasets/:id/publications", get(list_dataset_publications))
        .route(
            "/datasets/:id/publications/:publication_id",
            post(link_publication).delete(unlink_publication),
        )
}
