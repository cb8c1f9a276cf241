//! Publication endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::parse_id;
use crate::error::ApiResult;
use crate::pagination::Pagination;
use crate::AppState;
use aicat_common::db::{NewPublication, Publication, PublicationWithDatasets};

/// GET /publications
pub async fn list_publications(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Publication>>> {
    let (offset, limit) = page.sanitized();
    Ok(Json(state.catalog.list_publications(offset, limit).await?))
}

/// POST /publications
pub async fn register_publication(
    State(state): State<AppState>,
    Json(publication): Json<NewPublication>,
) -> ApiResult<Json<PublicationWithDatasets>> {
    Ok(Json(state.catalog.register_publication(&publication).await?))
}

/// GET /publications/:id, with linked datasets
pub async fn get_publication(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PublicationWithDatasets>> {
    let id = parse_id(&id, "Publication")?;
    Ok(Json(state.catalog.get_publication(id).await?))
}

/// PUT /publications/:id
pub async fn update_publication(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(publication): Json<NewPublication>,
) -> ApiResult<Json<PublicationWithDatasets>> {
    let id = parse_id(&id, "Publication")?;
    Ok(Json(state.catalog.update_publication(id, &publication).await?))
}

/// DELETE /publications/:id
pub async fn delete_publication(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "Publication")?;
    state.catalog.delete_publication(id).await?;
    Ok(StatusCode::OK)
}

/// Build publication routes
pub fn publication_routes() -> Router<AppState> {
    Router::new()
        .route("/publications", get(list_publications).post(register_publication))
        .route(
            "/publications/:id",
            get(get_publication)
                .put(update_publication)
                .delete(delete_publication),
        )
}
