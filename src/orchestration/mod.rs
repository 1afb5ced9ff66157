//! Orchestration
//!
//! # Overview
//!
//! - [`Definitions`] - assets, jobs, schedules and sensors for a config
//! - [`evaluate_sensors`] - which jobs a set of materializations requests
//! - [`Orchestrator`] - runs jobs one at a time, feeds sensors, serves the
//!   cron schedule

mod orchestrator;
mod types;

pub use orchestrator::{JobRun, Orchestrator};
pub use types::{
    evaluate_sensors, load_asset_prefix, AssetDef, AssetKey, AssetKind, AssetSelection,
    Definitions, JobDef, RunRequest, ScheduleDef, SensorDef, DAILY_SCHEDULE, LOAD_JOB,
    TRANSFORM_ASSET, TRANSFORM_JOB,
};
