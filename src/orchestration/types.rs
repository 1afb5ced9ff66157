//! Orchestration definitions
//!
//! Assets, jobs, schedules and sensors, derived from the pipeline config.

use crate::config::PipelineConfig;
use crate::pipeline::{JobAdsResource, SOURCE_NAME};
use serde::Serialize;
use std::fmt;

/// Job that loads every job-ads resource
pub const LOAD_JOB: &str = "load_job_ads";
/// Job that runs the dbt build
pub const TRANSFORM_JOB: &str = "transform_job_ads";
/// Daily schedule for [`LOAD_JOB`]
pub const DAILY_SCHEDULE: &str = "daily_load";
/// Asset key of the dbt build
pub const TRANSFORM_ASSET: &str = "dbt_job_ads_models";

/// Prefix shared by all load asset keys
pub fn load_asset_prefix() -> String {
    format!("dlt_{SOURCE_NAME}")
}

// ============================================================================
// Assets
// ============================================================================

/// Name of a materializable output
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    /// Create a key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of the load asset for a resource name (`dlt_jobads_source_<resource>`)
    pub fn for_resource(resource: &str) -> Self {
        Self(format!("{}_{resource}", load_asset_prefix()))
    }

    /// Key string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What materializing an asset does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetKind {
    /// Load one job-ads resource into the warehouse
    Load {
        /// Occupation field the resource searches
        occupation_field: String,
    },
    /// Run the dbt build
    Transform,
}

/// A declared asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDef {
    /// Asset key
    pub key: AssetKey,
    /// What materializing it does
    #[serde(flatten)]
    pub kind: AssetKind,
}

// ============================================================================
// Jobs, schedules, sensors
// ============================================================================

/// Which assets a job materializes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSelection {
    /// Every asset whose key starts with the prefix
    KeyPrefix(String),
    /// The listed assets
    Keys(Vec<AssetKey>),
}

impl AssetSelection {
    /// Whether `key` is selected
    pub fn matches(&self, key: &AssetKey) -> bool {
        match self {
            Self::KeyPrefix(prefix) => key.as_str().starts_with(prefix.as_str()),
            Self::Keys(keys) => keys.contains(key),
        }
    }
}

/// A named job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDef {
    /// Job name
    pub name: String,
    /// Assets it materializes
    pub selection: AssetSelection,
}

/// A cron schedule for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleDef {
    /// Schedule name
    pub name: String,
    /// Job to run
    pub job: String,
    /// Cron expression (seconds first, UTC)
    pub cron: String,
}

/// Requests a job when an asset materializes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorDef {
    /// Sensor name
    pub name: String,
    /// Watched asset
    pub asset: AssetKey,
    /// Job to request
    pub job: String,
}

/// A job run requested by a sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    /// Job to run
    pub job: String,
    /// Sensor that asked for it
    pub sensor: String,
    /// Asset that triggered the sensor
    pub asset: AssetKey,
}

// ============================================================================
// Definitions
// ============================================================================

/// Everything the orchestrator knows about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Definitions {
    /// Declared assets, load assets first
    pub assets: Vec<AssetDef>,
    /// Declared jobs
    pub jobs: Vec<JobDef>,
    /// Declared schedules
    pub schedules: Vec<ScheduleDef>,
    /// Declared sensors
    pub sensors: Vec<SensorDef>,
}

impl Definitions {
    /// Build definitions for a config
    ///
    /// The transform job, its asset and the sensors exist only when
    /// `transform_enabled`.
    pub fn from_config(config: &PipelineConfig, transform_enabled: bool) -> Self {
        let mut defs = Self::default();

        for field in &config.source.occupation_fields {
            let resource = JobAdsResource::name_for(field);
            defs.assets.push(AssetDef {
                key: AssetKey::for_resource(&resource),
                kind: AssetKind::Load {
                    occupation_field: field.clone(),
                },
            });
        }

        defs.jobs.push(JobDef {
            name: LOAD_JOB.to_string(),
            selection: AssetSelection::KeyPrefix(load_asset_prefix()),
        });
        defs.schedules.push(ScheduleDef {
            name: DAILY_SCHEDULE.to_string(),
            job: LOAD_JOB.to_string(),
            cron: config.schedule.cron.clone(),
        });

        if transform_enabled {
            let transform = AssetKey::new(TRANSFORM_ASSET);
            defs.assets.push(AssetDef {
                key: transform.clone(),
                kind: AssetKind::Transform,
            });
            defs.jobs.push(JobDef {
                name: TRANSFORM_JOB.to_string(),
                selection: AssetSelection::Keys(vec![transform]),
            });

            for field in &config.source.occupation_fields {
                let resource = JobAdsResource::name_for(field);
                defs.sensors.push(SensorDef {
                    name: format!("transform_on_{field}"),
                    asset: AssetKey::for_resource(&resource),
                    job: TRANSFORM_JOB.to_string(),
                });
            }
        }

        defs
    }

    /// Look up a job
    pub fn job(&self, name: &str) -> Option<&JobDef> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Look up an asset
    pub fn asset(&self, key: &AssetKey) -> Option<&AssetDef> {
        self.assets.iter().find(|a| &a.key == key)
    }

    /// Assets a job materializes, in declaration order
    pub fn assets_for_job(&self, job: &JobDef) -> Vec<&AssetDef> {
        self.assets
            .iter()
            .filter(|a| job.selection.matches(&a.key))
            .collect()
    }
}

/// Run requests for a set of materialized assets
///
/// One request per sensor watching any of `materialized`, in sensor order.
pub fn evaluate_sensors(defs: &Definitions, materialized: &[AssetKey]) -> Vec<RunRequest> {
    defs.sensors
        .iter()
        .filter_map(|sensor| {
            materialized
                .iter()
                .find(|key| **key == sensor.asset)
                .map(|key| RunRequest {
                    job: sensor.job.clone(),
                    sensor: sensor.name.clone(),
                    asset: key.clone(),
                })
        })
        .collect()
}
