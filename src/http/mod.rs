//! HTTP client module
//!
//! Provides the transport used by the job-search source.
//!
//! # Features
//!
//! - **Fail fast**: any non-2xx response is an error, nothing is retried
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Fixed timeout**: one per-call timeout, overridable per request

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
