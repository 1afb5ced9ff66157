//! CLI module
//!
//! Command-line interface for the job-ads pipeline.
//!
//! # Commands
//!
//! - `load` - Extract job ads and load them into the warehouse
//! - `transform` - Run the dbt build
//! - `run` - Run an orchestration job, then triggered sensors
//! - `serve` - Run schedules and sensors until interrupted
//! - `query` / `tables` - Read-only warehouse access
//! - `definitions` / `validate` - Inspect the configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
