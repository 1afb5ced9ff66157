//! Job execution, sensors and the cron scheduler

use super::types::{evaluate_sensors, AssetKey, AssetKind, Definitions};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::pipeline::{JobAdsSource, LoadInfo, Pipeline};
use crate::source::JobSearchSource;
use crate::transform::{DbtRunner, TransformInfo};
use crate::warehouse::Warehouse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Outcome of one job run
#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    /// Job name
    pub job: String,
    /// Assets materialized, in order
    pub materialized: Vec<AssetKey>,
    /// Resource loads performed
    pub loads: Vec<LoadInfo>,
    /// dbt invocation, if the job ran one
    pub transform: Option<TransformInfo>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
}

/// Runs jobs, reacts to materializations and drives the schedule
///
/// Only one job runs at a time, so the warehouse file is never opened by two
/// writers.
pub struct Orchestrator {
    config: PipelineConfig,
    defs: Definitions,
    dbt: Option<DbtRunner>,
    run_lock: Mutex<()>,
    events_tx: mpsc::UnboundedSender<AssetKey>,
    events_rx: Mutex<mpsc::UnboundedReceiver<AssetKey>>,
}

impl Orchestrator {
    /// Build an orchestrator; dbt is detected from the transform config
    pub fn new(config: PipelineConfig) -> Self {
        let dbt = DbtRunner::detect(&config.transform);
        Self::with_dbt(config, dbt)
    }

    /// Build an orchestrator with an explicit dbt runner (or none)
    pub fn with_dbt(config: PipelineConfig, dbt: Option<DbtRunner>) -> Self {
        let defs = Definitions::from_config(&config, dbt.is_some());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            defs,
            dbt,
            run_lock: Mutex::new(()),
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    /// The definitions in effect
    pub fn definitions(&self) -> &Definitions {
        &self.defs
    }

    /// Run a job by name
    ///
    /// Every selected asset is attempted. Each success emits a
    /// materialization event; the first failure is returned once the rest
    /// have run.
    pub async fn run_job(&self, name: &str) -> Result<JobRun> {
        let job = self.defs.job(name).ok_or_else(|| Error::JobNotFound {
            job: name.to_string(),
        })?;

        let _guard = self.run_lock.lock().await;
        let started_at = Utc::now();
        info!(job = %job.name, "Starting job run");

        let mut run = JobRun {
            job: job.name.clone(),
            materialized: Vec::new(),
            loads: Vec::new(),
            transform: None,
            started_at,
            finished_at: started_at,
        };
        let mut first_error = None;

        let assets = self.defs.assets_for_job(job);
        let loads: Vec<&str> = assets
            .iter()
            .filter_map(|a| match &a.kind {
                AssetKind::Load { occupation_field } => Some(occupation_field.as_str()),
                AssetKind::Transform => None,
            })
            .collect();

        if !loads.is_empty() {
            match self.load(&loads).await {
                Ok(results) => {
                    for (field, result) in results {
                        match result {
                            Ok(info) => {
                                let key = AssetKey::for_resource(&info.resource);
                                self.materialized(&key);
                                run.materialized.push(key);
                                run.loads.push(info);
                            }
                            Err(e) => {
                                error!(job = %job.name, "Loading {field} failed: {e}");
                                first_error.get_or_insert(e);
                            }
                        }
                    }
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        for asset in assets.iter().filter(|a| a.kind == AssetKind::Transform) {
            let Some(dbt) = &self.dbt else {
                warn!("Skipping {}: dbt is not available", asset.key);
                continue;
            };
            match dbt.build().await {
                Ok(info) => {
                    self.materialized(&asset.key);
                    run.materialized.push(asset.key.clone());
                    run.transform = Some(info);
                }
                Err(e) => {
                    error!(job = %job.name, "dbt build failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        run.finished_at = Utc::now();
        match first_error {
            Some(e) => Err(e),
            None => {
                info!(
                    job = %run.job,
                    assets = run.materialized.len(),
                    "Job run succeeded"
                );
                Ok(run)
            }
        }
    }

    /// Load the given occupation fields, one result per field
    async fn load(&self, fields: &[&str]) -> Result<Vec<(String, Result<LoadInfo>)>> {
        let api = JobSearchSource::from_config(&self.config.source)?;
        let source = JobAdsSource::from_config(&self.config);
        let warehouse = Warehouse::open(&self.config.warehouse.path)?;
        let mut pipeline = Pipeline::from_config(&self.config, warehouse);

        let mut results = Vec::with_capacity(fields.len());
        for field in fields {
            let Some(resource) = source.resource(field) else {
                continue;
            };
            let result = pipeline.run(&resource, &api).await;
            if result.is_ok() {
                info!("Loaded occupation field: {field}");
            }
            results.push(((*field).to_string(), result));
        }
        Ok(results)
    }

    fn materialized(&self, key: &AssetKey) {
        info!(asset = %key, "Asset materialized");
        // The receiver lives as long as self
        let _ = self.events_tx.send(key.clone());
    }

    /// Evaluate sensors against every queued materialization
    ///
    /// Requests for the same job are coalesced into a single run.
    pub async fn tick_sensors(&self) -> Vec<Result<JobRun>> {
        let keys = {
            let mut rx = self.events_rx.lock().await;
            let mut keys = Vec::new();
            while let Ok(key) = rx.try_recv() {
                keys.push(key);
            }
            keys
        };
        self.handle_events(keys).await
    }

    async fn handle_events(&self, keys: Vec<AssetKey>) -> Vec<Result<JobRun>> {
        let mut jobs: Vec<String> = Vec::new();
        for request in evaluate_sensors(&self.defs, &keys) {
            info!(
                sensor = %request.sensor,
                asset = %request.asset,
                "Sensor requested {}",
                request.job
            );
            if !jobs.contains(&request.job) {
                jobs.push(request.job);
            }
        }

        let mut runs = Vec::with_capacity(jobs.len());
        for job in jobs {
            let result = self.run_job(&job).await;
            if let Err(e) = &result {
                error!(job = %job, "Sensor-triggered run failed: {e}");
            }
            runs.push(result);
        }
        runs
    }

    /// React to materializations until the task is dropped
    async fn sensor_loop(self: Arc<Self>) {
        loop {
            let first = {
                let mut rx = self.events_rx.lock().await;
                rx.recv().await
            };
            let Some(first) = first else {
                break;
            };

            // Let the running job finish so its remaining events coalesce
            drop(self.run_lock.lock().await);

            let mut keys = vec![first];
            {
                let mut rx = self.events_rx.lock().await;
                while let Ok(key) = rx.try_recv() {
                    keys.push(key);
                }
            }
            self.handle_events(keys).await;
        }
    }

    /// Run the schedules and sensors until Ctrl-C
    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        for schedule in &self.defs.schedules {
            let orchestrator = Arc::clone(&self);
            let job_name = schedule.job.clone();
            let schedule_name = schedule.name.clone();

            let job = Job::new_async(schedule.cron.as_str(), move |_uuid, _lock| {
                let orchestrator = Arc::clone(&orchestrator);
                let job_name = job_name.clone();
                let schedule_name = schedule_name.clone();
                Box::pin(async move {
                    info!(schedule = %schedule_name, "Schedule fired for {job_name}");
                    if let Err(e) = orchestrator.run_job(&job_name).await {
                        error!(schedule = %schedule_name, "Scheduled run of {job_name} failed: {e}");
                    }
                })
            })?;
            scheduler.add(job).await?;

            info!(
                "Scheduled {} -> {} [cron: {} UTC]",
                schedule.name, schedule.job, schedule.cron
            );
        }

        let sensors = tokio::spawn(Arc::clone(&self).sensor_loop());
        scheduler.start().await?;
        info!(
            schedules = self.defs.schedules.len(),
            sensors = self.defs.sensors.len(),
            "Orchestrator running, press Ctrl-C to stop"
        );

        tokio::signal::ctrl_c().await?;
        info!("Shutting down");

        sensors.abort();
        scheduler.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("defs", &self.defs)
            .field("dbt", &self.dbt)
            .finish_non_exhaustive()
    }
}
