//! HTTP API handlers for aicat-cs

pub mod datasets;
pub mod health;
pub mod nodes;
pub mod publications;

pub use datasets::dataset_routes;
pub use health::health_routes;
pub use nodes::node_routes;
pub use publications::publication_routes;

use crate::error::{ApiError, ApiResult};

/// Surrogate ids arrive as path text; anything non-numeric cannot exist
pub(crate) fn parse_id(raw: &str, entity: &str) -> ApiResult<i64> {
    raw.parse::<i64>().map_err(|_| {
        ApiError::NotFound(format!("{} '{}' not found in the database.", entity, raw))
    })
}
