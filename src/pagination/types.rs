//! Pagination types
//!
//! Cursor state and the outcome of processing one page.

use serde::Serialize;
use std::fmt;

/// Why a pagination run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The page had no records
    EmptyPage,
    /// The page had fewer records than the page size
    ShortPage,
    /// The offset went past the configured ceiling
    OffsetCeiling,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPage => write!(f, "empty page"),
            Self::ShortPage => write!(f, "short page"),
            Self::OffsetCeiling => write!(f, "offset ceiling"),
        }
    }
}

/// Result of processing a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch the next page at this offset
    Continue {
        /// Offset for the next request
        offset: u32,
    },
    /// No more pages
    Done(StopReason),
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }

    /// The stop reason, if pagination finished
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            Self::Done(reason) => Some(*reason),
            Self::Continue { .. } => None,
        }
    }
}

/// Tracks pagination state during one run
///
/// Lives only as long as a single run; it is never persisted.
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Offset of the next page to fetch
    pub offset: u32,
    /// Pages fetched so far
    pub pages: u32,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Set once pagination is complete
    pub stop: Option<StopReason>,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Is pagination complete?
    pub fn is_done(&self) -> bool {
        self.stop.is_some()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self, reason: StopReason) {
        self.stop = Some(reason);
    }

    /// Advance the offset, returning false (and leaving it unchanged) on overflow
    pub fn add_offset(&mut self, amount: u32) -> bool {
        match self.offset.checked_add(amount) {
            Some(next) => {
                self.offset = next;
                true
            }
            None => false,
        }
    }

    /// Record a fetched page
    pub fn add_page(&mut self, records: u64) {
        self.pages += 1;
        self.total_fetched += records;
    }
}
