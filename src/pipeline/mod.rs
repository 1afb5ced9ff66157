//! Load pipeline
//!
//! Streams each resource out of a [`PageSource`] and into the warehouse.
//!
//! # Overview
//!
//! - [`JobAdsSource`] expands into one [`JobAdsResource`] per occupation field
//! - [`Pipeline::run`] loads one resource inside a single transaction
//! - [`LoadInfo`] summarizes a committed load
//!
//! A resource load is all-or-nothing: records are inserted in batches but only
//! committed once the source stream ends cleanly. Either way a row is written
//! to the load ledger.

mod types;

pub use types::{JobAdsResource, JobAdsSource, LoadInfo, DEFAULT_TABLE, SOURCE_NAME};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::source::{paginate, PageSource};
use crate::types::{LoadStatus, WriteDisposition};
use crate::warehouse::{LoadLedgerEntry, Warehouse};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Default number of records per insert batch
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Loads resources into a warehouse
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    dataset: String,
    batch_size: usize,
    write_disposition: WriteDisposition,
    warehouse: Warehouse,
}

impl Pipeline {
    /// Create a pipeline writing into `dataset`
    pub fn new(name: impl Into<String>, dataset: impl Into<String>, warehouse: Warehouse) -> Self {
        Self {
            name: name.into(),
            dataset: dataset.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            write_disposition: WriteDisposition::Append,
            warehouse,
        }
    }

    /// Create the pipeline a config describes
    pub fn from_config(config: &PipelineConfig, warehouse: Warehouse) -> Self {
        Self::new(
            config.pipeline.name.clone(),
            config.pipeline.dataset.clone(),
            warehouse,
        )
        .with_batch_size(config.pipeline.batch_size)
        .with_write_disposition(config.pipeline.write_disposition)
    }

    /// Set the insert batch size (0 is treated as 1)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the write disposition
    #[must_use]
    pub fn with_write_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = disposition;
        self
    }

    /// Pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dataset (schema) name
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// The destination warehouse
    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Load one resource
    ///
    /// On error nothing from this run stays in the table, a `failed` ledger
    /// row is written, and the error is returned.
    pub async fn run<S>(&mut self, resource: &JobAdsResource, source: &S) -> Result<LoadInfo>
    where
        S: PageSource + ?Sized,
    {
        let started_at = Utc::now();
        let load_id = new_load_id(started_at);
        let table = format!("{}.{}", self.dataset, resource.table);

        self.warehouse.ensure_table(&self.dataset, &resource.table)?;

        info!(
            pipeline = %self.name,
            resource = %resource.name,
            load_id = %load_id,
            "Starting load into {table}"
        );

        self.warehouse.begin()?;
        let loaded = self
            .load_rows(resource, source, &table, &load_id, started_at)
            .await;

        let mut entry = LoadLedgerEntry {
            load_id: load_id.clone(),
            pipeline_name: self.name.clone(),
            resource: resource.name.clone(),
            table_name: table.clone(),
            status: LoadStatus::Loaded,
            row_count: 0,
            started_at,
            finished_at: Utc::now(),
            error: None,
        };

        // The `loaded` ledger row commits together with the data
        let committed = loaded.and_then(|rows| {
            entry.row_count = rows;
            self.warehouse.record_load(&self.dataset, &entry)?;
            self.warehouse.commit()?;
            Ok(rows)
        });

        match committed {
            Ok(rows) => {
                info!(
                    resource = %resource.name,
                    rows,
                    "Load {load_id} committed"
                );

                Ok(LoadInfo {
                    pipeline: self.name.clone(),
                    dataset: self.dataset.clone(),
                    table,
                    resource: resource.name.clone(),
                    load_id,
                    row_count: rows,
                    started_at,
                    finished_at: entry.finished_at,
                })
            }
            Err(e) => {
                if let Err(rb) = self.warehouse.rollback() {
                    warn!("Rollback of load {load_id} failed: {rb}");
                }

                entry.status = LoadStatus::Failed;
                entry.row_count = 0;
                entry.error = Some(e.to_string());
                if let Err(le) = self.warehouse.record_load(&self.dataset, &entry) {
                    warn!("Could not record failed load {load_id}: {le}");
                }

                warn!(resource = %resource.name, "Load {load_id} failed: {e}");
                Err(e)
            }
        }
    }

    /// Load every resource of `source` in order, stopping at the first failure
    pub async fn run_all<S>(&mut self, source: &JobAdsSource, pages: &S) -> Result<Vec<LoadInfo>>
    where
        S: PageSource + ?Sized,
    {
        let mut loads = Vec::new();
        for resource in source.resources() {
            let info = self.run(&resource, pages).await?;
            info!("Loaded occupation field: {}", resource.occupation_field);
            loads.push(info);
        }
        Ok(loads)
    }

    async fn load_rows<S>(
        &mut self,
        resource: &JobAdsResource,
        source: &S,
        table: &str,
        load_id: &str,
        loaded_at: DateTime<Utc>,
    ) -> Result<u64>
    where
        S: PageSource + ?Sized,
    {
        if self.write_disposition == WriteDisposition::Replace {
            let deleted = self.warehouse.delete_resource(table, &resource.name)?;
            debug!(resource = %resource.name, deleted, "Cleared previous rows");
        }

        let mut records = paginate(source, &resource.params, resource.max_offset)?;
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut rows = 0u64;

        while let Some(record) = records.next().await {
            batch.push(record?);
            if batch.len() >= self.batch_size {
                rows += self.flush(table, load_id, &resource.name, loaded_at, &mut batch)?;
            }
        }
        if !batch.is_empty() {
            rows += self.flush(table, load_id, &resource.name, loaded_at, &mut batch)?;
        }

        Ok(rows)
    }

    fn flush(
        &self,
        table: &str,
        load_id: &str,
        resource: &str,
        loaded_at: DateTime<Utc>,
        batch: &mut Vec<serde_json::Value>,
    ) -> Result<u64> {
        let n = self
            .warehouse
            .append_records(table, load_id, resource, loaded_at, batch)?;
        debug!(resource, rows = n, "Inserted batch");
        batch.clear();
        Ok(n as u64)
    }
}

/// Load id: the start time as fractional Unix seconds
fn new_load_id(started_at: DateTime<Utc>) -> String {
    format!(
        "{}.{:06}",
        started_at.timestamp(),
        started_at.timestamp_subsec_micros()
    )
}

#[cfg(test)]
mod tests;
