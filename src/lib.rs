// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # jobads-etl
//!
//! Extract Swedish job ads from the JobTech job-search API, load them into an
//! embedded DuckDB warehouse, and hand them to dbt for modelling.
//!
//! ## Features
//!
//! - **Bounded offset pagination**: stops on an empty page, a short page, or
//!   the service's offset ceiling
//! - **Transactional loads**: each resource commits all of its rows or none,
//!   with a load ledger
//! - **dbt integration**: `dbt build` after loads, skipped when no project is
//!   present
//! - **Orchestration**: jobs, a daily UTC schedule and materialization sensors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobads_etl::config::PipelineConfig;
//! use jobads_etl::pipeline::{JobAdsSource, Pipeline};
//! use jobads_etl::source::JobSearchSource;
//! use jobads_etl::warehouse::Warehouse;
//!
//! #[tokio::main]
//! async fn main() -> jobads_etl::Result<()> {
//!     let config = PipelineConfig::default();
//!     let api = JobSearchSource::from_config(&config.source)?;
//!     let warehouse = Warehouse::open(&config.warehouse.path)?;
//!
//!     let mut pipeline = Pipeline::from_config(&config, warehouse);
//!     for load in pipeline.run_all(&JobAdsSource::from_config(&config), &api).await? {
//!         println!("{load}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator                           │
//! │   schedule (cron, UTC) → load job → sensors → transform job    │
//! └────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────┬──────────────┬───┴──────────┬──────────┬───────────┐
//! │   HTTP    │  Pagination  │   Pipeline   │Warehouse │ Transform │
//! ├───────────┼──────────────┼──────────────┼──────────┼───────────┤
//! │ Timeout   │ Offset       │ Resources    │ DuckDB   │ dbt build │
//! │ Rate limit│ Ceiling      │ Batches      │ Ledger   │           │
//! └───────────┴──────────────┴──────────────┴──────────┴───────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Template interpolation for config files
pub mod template;

/// Pipeline configuration
pub mod config;

/// HTTP client with timeouts and rate limiting
pub mod http;

/// Offset pagination
pub mod pagination;

/// Job-search source and the paginated fetch loop
pub mod source;

/// DuckDB warehouse
pub mod warehouse;

/// Load pipeline
pub mod pipeline;

/// dbt invocation
pub mod transform;

/// Jobs, schedules and sensors
pub mod orchestration;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{load_config, load_config_from_str, PipelineConfig};
pub use pipeline::{JobAdsSource, LoadInfo, Pipeline};
pub use source::{paginate, JobSearchSource, PageSource, SearchParams};
pub use warehouse::Warehouse;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
