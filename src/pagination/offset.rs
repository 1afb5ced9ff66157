//! Offset pagination
//!
//! Walks a search endpoint with `offset`/`limit` parameters.

use super::types::{NextPage, PaginationState, StopReason};
use crate::error::{Error, Result};

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default offset ceiling; a page fetched at an offset above this is the last one
pub const DEFAULT_MAX_OFFSET: u32 = 1900;

/// Offset-based pagination with a safety ceiling
///
/// A run ends on the first of:
/// 1. an empty page (checked before any record of that page is emitted),
/// 2. a page shorter than `page_size`,
/// 3. a page fetched at an offset greater than `max_offset`, or one whose
///    successor offset would not fit in a `u32`.
///
/// Rule 2 assumes the service only returns a partial page at the true end of
/// the results. It is a heuristic about the remote API rather than a protocol
/// guarantee; a service that returns short pages mid-stream ends the run early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Query parameter name for limit
    pub limit_param: String,
    /// Number of records per page
    pub page_size: u32,
    /// Offset ceiling
    pub max_offset: u32,
}

impl OffsetPaginator {
    /// Create a paginator with the default parameter names and ceiling
    pub fn new(page_size: u32) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::invalid_value("limit", "page size must be greater than 0"));
        }
        Ok(Self {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            page_size,
            max_offset: DEFAULT_MAX_OFFSET,
        })
    }

    /// Set the offset ceiling
    #[must_use]
    pub fn with_max_offset(mut self, max_offset: u32) -> Self {
        self.max_offset = max_offset;
        self
    }

    /// Set the query parameter names
    #[must_use]
    pub fn with_param_names(
        mut self,
        offset_param: impl Into<String>,
        limit_param: impl Into<String>,
    ) -> Self {
        self.offset_param = offset_param.into();
        self.limit_param = limit_param.into();
        self
    }

    /// Query parameters for the page at the current offset
    pub fn page_params(&self, state: &PaginationState) -> Vec<(String, String)> {
        vec![
            (self.limit_param.clone(), self.page_size.to_string()),
            (self.offset_param.clone(), state.offset.to_string()),
        ]
    }

    /// Process a fetched page and decide whether another one follows
    pub fn process_page(&self, records_count: usize, state: &mut PaginationState) -> NextPage {
        state.add_page(records_count as u64);

        if records_count == 0 {
            state.mark_done(StopReason::EmptyPage);
            return NextPage::Done(StopReason::EmptyPage);
        }

        if records_count < self.page_size as usize {
            state.mark_done(StopReason::ShortPage);
            return NextPage::Done(StopReason::ShortPage);
        }

        // An offset past u32::MAX is treated as past the ceiling
        if state.offset > self.max_offset || !state.add_offset(self.page_size) {
            state.mark_done(StopReason::OffsetCeiling);
            return NextPage::Done(StopReason::OffsetCeiling);
        }

        NextPage::Continue {
            offset: state.offset,
        }
    }
}

impl Default for OffsetPaginator {
    fn default() -> Self {
        Self {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_offset: DEFAULT_MAX_OFFSET,
        }
    }
}
