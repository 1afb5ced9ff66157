//! Search parameters

use crate::pagination::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter key used by the search API for occupation fields
pub const OCCUPATION_FIELD_PARAM: &str = "occupation-field";

/// Parameters for one search
///
/// `filters` are passed to the endpoint unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text query (may be empty)
    #[serde(default)]
    pub query: String,
    /// Page size
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Extra filter fields
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl SearchParams {
    /// Create params for a free-text query with the default page size
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
        }
    }

    /// Set the page size
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Add a pass-through filter
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Restrict the search to one occupation field
    #[must_use]
    pub fn with_occupation_field(self, field: impl Into<String>) -> Self {
        self.with_filter(OCCUPATION_FIELD_PARAM, field)
    }

    /// The occupation field filter, if set
    pub fn occupation_field(&self) -> Option<&str> {
        self.filters.get(OCCUPATION_FIELD_PARAM).map(String::as_str)
    }

    /// Query pairs for the request, excluding limit and offset
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(self.filters.len() + 1);
        query.push(("q".to_string(), self.query.clone()));
        query.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        query
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::new("")
    }
}
