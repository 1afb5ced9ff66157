//! Job-ad source
//!
//! # Overview
//!
//! - [`SearchParams`] - query, page size and pass-through filters
//! - [`PageSource`] - fetches one page; [`JobSearchSource`] does it over HTTP
//! - [`paginate`] - the bounded offset loop producing a record stream

mod fetcher;
mod jobsearch;
mod page;
mod params;

pub use fetcher::paginate;
pub use jobsearch::JobSearchSource;
pub use page::{Page, PageSource};
pub use params::{SearchParams, OCCUPATION_FIELD_PARAM};

#[cfg(test)]
mod tests;
