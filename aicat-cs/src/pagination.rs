//! Offset/limit pagination for list endpoints

use serde::Deserialize;

/// Default page size
pub const PAGE_SIZE: i64 = 100;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: i64 = 1000;

/// `?offset=&limit=` query parameters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Offset clamped to >= 0, limit to [0, MAX_PAGE_SIZE]
    pub fn sanitized(self) -> (i64, i64) {
        (self.offset.max(0), self.limit.clamp(0, MAX_PAGE_SIZE))
    }
}
