//! Pipeline types
//!
//! Resources to load and the summary of a finished load.

use crate::config::PipelineConfig;
use crate::pagination::{DEFAULT_MAX_OFFSET, DEFAULT_PAGE_SIZE};
use crate::source::SearchParams;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Name of the job-ads source, used in resource and asset names
pub const SOURCE_NAME: &str = "jobads_source";

/// Raw table every resource loads into by default
pub const DEFAULT_TABLE: &str = "project_job_ads";

/// The job-ads source: one search per occupation field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAdsSource {
    /// Free-text query shared by all resources
    pub query: String,
    /// Occupation fields, one resource each
    pub occupation_fields: Vec<String>,
    /// Page size
    pub limit: u32,
    /// Offset ceiling
    pub max_offset: u32,
    /// Destination table
    pub table: String,
}

impl JobAdsSource {
    /// Create a source for `query` with no occupation fields
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            occupation_fields: Vec::new(),
            limit: DEFAULT_PAGE_SIZE,
            max_offset: DEFAULT_MAX_OFFSET,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Build the source a config describes
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            query: config.source.query.clone(),
            occupation_fields: config.source.occupation_fields.clone(),
            limit: config.source.limit,
            max_offset: config.source.max_offset,
            table: config.pipeline.table.clone(),
        }
    }

    /// Add an occupation field
    #[must_use]
    pub fn with_occupation_field(mut self, field: impl Into<String>) -> Self {
        self.occupation_fields.push(field.into());
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the offset ceiling
    #[must_use]
    pub fn with_max_offset(mut self, max_offset: u32) -> Self {
        self.max_offset = max_offset;
        self
    }

    /// Set the destination table
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// One resource per occupation field, in configuration order
    pub fn resources(&self) -> Vec<JobAdsResource> {
        self.occupation_fields
            .iter()
            .map(|field| JobAdsResource {
                name: JobAdsResource::name_for(field),
                occupation_field: field.clone(),
                table: self.table.clone(),
                params: SearchParams::new(self.query.clone())
                    .with_limit(self.limit)
                    .with_occupation_field(field),
                max_offset: self.max_offset,
            })
            .collect()
    }

    /// Look up the resource for one occupation field
    pub fn resource(&self, occupation_field: &str) -> Option<JobAdsResource> {
        self.resources()
            .into_iter()
            .find(|r| r.occupation_field == occupation_field)
    }
}

/// One paginated extraction loaded into a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAdsResource {
    /// `jobads_<occupation field>`
    pub name: String,
    /// Occupation field filter
    pub occupation_field: String,
    /// Destination table (unqualified)
    pub table: String,
    /// Search params, limit included
    pub params: SearchParams,
    /// Offset ceiling
    pub max_offset: u32,
}

impl JobAdsResource {
    /// Resource name for an occupation field
    pub fn name_for(occupation_field: &str) -> String {
        format!("jobads_{occupation_field}")
    }
}

/// Summary of one committed resource load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadInfo {
    /// Pipeline name
    pub pipeline: String,
    /// Dataset (schema)
    pub dataset: String,
    /// Qualified destination table
    pub table: String,
    /// Resource name
    pub resource: String,
    /// Load identifier
    pub load_id: String,
    /// Rows committed
    pub row_count: u64,
    /// Load start
    pub started_at: DateTime<Utc>,
    /// Load end
    pub finished_at: DateTime<Utc>,
}

impl LoadInfo {
    /// Wall-clock duration in seconds
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

impl fmt::Display for LoadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Pipeline {} loaded {} in {:.2}s",
            self.pipeline,
            self.resource,
            self.elapsed_secs()
        )?;
        writeln!(
            f,
            "{} row(s) written to duckdb table {} (dataset {})",
            self.row_count, self.table, self.dataset
        )?;
        write!(f, "Load {} is LOADED", self.load_id)
    }
}
