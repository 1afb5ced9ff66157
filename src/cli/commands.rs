//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Job-ads ETL: extract from the job-search API, load into DuckDB, build with dbt
#[derive(Parser, Debug)]
#[command(name = "jobads-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load job ads into the warehouse
    Load {
        /// Occupation fields to load (comma-separated, empty = all configured)
        #[arg(long)]
        fields: Option<String>,
    },

    /// Run the dbt build
    Transform,

    /// Run an orchestration job by name
    Run {
        /// Job name (load_job_ads, transform_job_ads)
        job: String,

        /// Do not evaluate sensors after the run
        #[arg(long)]
        skip_sensors: bool,
    },

    /// Run schedules and sensors until interrupted
    Serve,

    /// Read rows from a warehouse table
    Query {
        /// Table to read (schema.table)
        #[arg(default_value = "staging.project_job_ads")]
        table: String,

        /// Maximum rows
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// List warehouse tables
    Tables,

    /// Show assets, jobs, schedules and sensors
    Definitions,

    /// Validate the configuration
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
