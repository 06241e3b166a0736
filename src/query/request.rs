//! Listing request and result shapes.

use crate::schema::types::SortDirection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
/// Upper bound on a page; larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Clone, Debug, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// One requested filter. The predicate shape comes from the field's
/// declared `filter_type`, not from the request.
#[derive(Clone, Debug, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub value: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryRequest {
    /// 0-based page index.
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub search: Option<String>,
}

impl QueryRequest {
    pub fn effective_page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.effective_page_size())
    }
}

/// Transient result of one listing request.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    /// Rows in scope before filters and search.
    pub total: u64,
    /// Rows matching filters and search.
    pub filtered: u64,
    pub rows: Vec<Value>,
    pub sortable: Vec<String>,
    pub filterable: Vec<String>,
}
