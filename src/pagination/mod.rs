//! Pagination module
//!
//! # Overview
//!
//! The search endpoint is paged with `offset`/`limit`. The paginator owns the
//! stop rules (empty page, short page, offset ceiling); the fetch loop in
//! [`crate::source`] owns the requests.

mod offset;
mod types;

pub use offset::{OffsetPaginator, DEFAULT_MAX_OFFSET, DEFAULT_PAGE_SIZE};
pub use types::{NextPage, PaginationState, StopReason};
