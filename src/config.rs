//! Pipeline configuration
//!
//! Configuration is a YAML file rendered through the template engine
//! (`{{ env.NAME }}`, `{{ vars.config_dir }}`) before being parsed. Every
//! field has a default, so an absent file yields the stock job-ads pipeline.
//! A few environment variables override the parsed values afterwards.

use crate::error::{Error, Result};
use crate::pagination::{DEFAULT_MAX_OFFSET, DEFAULT_PAGE_SIZE};
use crate::template::{self, TemplateContext};
use crate::types::WriteDisposition;
use crate::warehouse::validate_identifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides `warehouse.path`
pub const ENV_DB_PATH: &str = "JOBADS_DB_PATH";
/// Overrides `transform.project_dir`
pub const ENV_DBT_PROJECT_DIR: &str = "DBT_PROJECT_DIR";
/// Overrides `transform.profiles_dir`
pub const ENV_DBT_PROFILES_DIR: &str = "DBT_PROFILES_DIR";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline identity and load behaviour
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Search API source
    #[serde(default)]
    pub source: SourceConfig,

    /// DuckDB destination
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// dbt transformation
    #[serde(default)]
    pub transform: TransformConfig,

    /// Load schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

// ============================================================================
// Sections
// ============================================================================

/// Pipeline identity and load behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Pipeline name recorded in the load ledger
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    /// Dataset (DuckDB schema) for raw tables
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Raw table shared by all resources
    #[serde(default = "default_table")]
    pub table: String,
    /// Records inserted per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Append or replace
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            dataset: default_dataset(),
            table: default_table(),
            batch_size: default_batch_size(),
            write_disposition: WriteDisposition::default(),
        }
    }
}

fn default_pipeline_name() -> String {
    "job_ads".to_string()
}

fn default_dataset() -> String {
    "staging".to_string()
}

fn default_table() -> String {
    "project_job_ads".to_string()
}

fn default_batch_size() -> usize {
    500
}

/// Search API source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// API root
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Search endpoint path
    #[serde(default = "default_search_path")]
    pub path: String,
    /// Free-text query
    #[serde(default)]
    pub query: String,
    /// Page size
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Offset ceiling
    #[serde(default = "default_max_offset")]
    pub max_offset: u32,
    /// One resource is loaded per occupation field
    #[serde(default = "default_occupation_fields")]
    pub occupation_fields: Vec<String>,
    /// Field holding the result records
    #[serde(default = "default_records_path")]
    pub records_path: String,
    /// Field holding the total match count
    #[serde(default = "default_total_path")]
    pub total_path: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Request pacing (None disables the limiter)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_search_path(),
            query: String::new(),
            limit: default_limit(),
            max_offset: default_max_offset(),
            occupation_fields: default_occupation_fields(),
            records_path: default_records_path(),
            total_path: default_total_path(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

fn default_base_url() -> String {
    "https://jobsearch.api.jobtechdev.se".to_string()
}

fn default_search_path() -> String {
    "/search".to_string()
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_offset() -> u32 {
    DEFAULT_MAX_OFFSET
}

fn default_occupation_fields() -> Vec<String> {
    // Construction, culture/media/design, education
    vec![
        "j7Cq_ZJe_GkT".to_string(),
        "9puE_nYg_crq".to_string(),
        "MVqp_eS8_kDZ".to_string(),
    ]
}

fn default_records_path() -> String {
    "hits".to_string()
}

fn default_total_path() -> Option<String> {
    Some("total.value".to_string())
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_requests_per_second() -> Option<u32> {
    Some(5)
}

/// DuckDB destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data_warehouse/job_ads.duckdb")
}

/// dbt transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    /// Run dbt after loads when a project is present
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// dbt project directory
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,
    /// dbt profiles directory (dbt's own default when unset)
    #[serde(default)]
    pub profiles_dir: Option<PathBuf>,
    /// dbt executable
    #[serde(default = "default_dbt_executable")]
    pub executable: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_dir: default_project_dir(),
            profiles_dir: None,
            executable: default_dbt_executable(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_project_dir() -> PathBuf {
    PathBuf::from("data_transformation")
}

fn default_dbt_executable() -> String {
    "dbt".to_string()
}

/// Load schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Cron expression, seconds first, evaluated in UTC
    #[serde(default = "default_cron")]
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
        }
    }
}

fn default_cron() -> String {
    "0 25 11 * * *".to_string()
}

// ============================================================================
// Loading
// ============================================================================

/// Load a config file, or the defaults when `path` is None
///
/// Relative paths in the file resolve against the file's directory; with no
/// file they resolve against the working directory.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let lookup = |key: &str| std::env::var(key).ok();

    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::config(format!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            })?;
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));

            let mut ctx = TemplateContext::from_env();
            ctx.set_var("config_dir", base.to_string_lossy().to_string());

            let mut config = load_config_from_str(&content, &ctx)?;
            config.resolve_paths(base);
            config
        }
        None => PipelineConfig::default(),
    };

    config.apply_env_overrides(lookup);
    config.validate()?;
    Ok(config)
}

/// Parse a config from YAML text, rendering templates first
pub fn load_config_from_str(yaml: &str, ctx: &TemplateContext) -> Result<PipelineConfig> {
    let raw: Value = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse config YAML: {e}")))?;

    if raw.is_null() {
        return Ok(PipelineConfig::default());
    }

    let rendered = template::render_value(&raw, ctx)?;
    let config: PipelineConfig = serde_json::from_value(rendered)
        .map_err(|e| Error::config(format!("Invalid config: {e}")))?;

    config.validate()?;
    Ok(config)
}

impl PipelineConfig {
    /// Resolve relative paths against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &PathBuf| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.clone()
            }
        };
        self.warehouse.path = resolve(&self.warehouse.path);
        self.transform.project_dir = resolve(&self.transform.project_dir);
        self.transform.profiles_dir = self.transform.profiles_dir.as_ref().map(resolve);
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|s| !s.is_empty()) {
            self.warehouse.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_DBT_PROJECT_DIR).filter(|s| !s.is_empty()) {
            self.transform.project_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_DBT_PROFILES_DIR).filter(|s| !s.is_empty()) {
            self.transform.profiles_dir = Some(PathBuf::from(dir));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.name.is_empty() {
            return Err(Error::missing_field("pipeline.name"));
        }
        validate_identifier(&self.pipeline.dataset)?;
        validate_identifier(&self.pipeline.table)?;
        if self.pipeline.batch_size == 0 {
            return Err(Error::invalid_value(
                "pipeline.batch_size",
                "must be greater than 0",
            ));
        }

        if self.source.base_url.is_empty() {
            return Err(Error::missing_field("source.base_url"));
        }
        if self.source.limit == 0 {
            return Err(Error::invalid_value(
                "source.limit",
                "must be greater than 0",
            ));
        }
        if self.source.occupation_fields.is_empty() {
            return Err(Error::missing_field("source.occupation_fields"));
        }
        if self.source.occupation_fields.iter().any(String::is_empty) {
            return Err(Error::invalid_value(
                "source.occupation_fields",
                "entries cannot be empty",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        if !self.source.occupation_fields.iter().all(|f| seen.insert(f)) {
            return Err(Error::invalid_value(
                "source.occupation_fields",
                "duplicate occupation field",
            ));
        }

        if self.warehouse.path.as_os_str().is_empty() {
            return Err(Error::missing_field("warehouse.path"));
        }
        if self.schedule.cron.trim().is_empty() {
            return Err(Error::missing_field("schedule.cron"));
        }

        Ok(())
    }

    /// Fully qualified raw table name (`dataset.table`)
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.pipeline.dataset, self.pipeline.table)
    }
}
