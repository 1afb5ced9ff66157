//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{load_config, PipelineConfig};
use crate::error::{Error, Result, ResultExt};
use crate::orchestration::{Definitions, Orchestrator};
use crate::pipeline::{JobAdsSource, Pipeline};
use crate::source::JobSearchSource;
use crate::transform::DbtRunner;
use crate::warehouse::Warehouse;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = load_config(self.cli.config.as_deref())?;

        match &self.cli.command {
            Commands::Load { fields } => self.load(config, fields.as_deref()).await,
            Commands::Transform => self.transform(&config).await,
            Commands::Run { job, skip_sensors } => self.run_job(config, job, *skip_sensors).await,
            Commands::Serve => Arc::new(Orchestrator::new(config)).serve().await,
            Commands::Query { table, limit } => self.query(&config, table, *limit),
            Commands::Tables => self.tables(&config),
            Commands::Definitions => self.definitions(&config),
            Commands::Validate => self.validate(&config),
        }
    }

    /// Load the selected occupation fields
    async fn load(&self, config: PipelineConfig, fields: Option<&str>) -> Result<()> {
        let start = Instant::now();
        let mut source = JobAdsSource::from_config(&config);
        if let Some(fields) = fields {
            source.occupation_fields = select_fields(&source.occupation_fields, fields)?;
        }

        let api = JobSearchSource::from_config(&config.source)?;
        let warehouse = Warehouse::open(&config.warehouse.path)?;
        let mut pipeline = Pipeline::from_config(&config, warehouse);

        let loads = pipeline.run_all(&source, &api).await?;

        for info in &loads {
            if self.cli.format == OutputFormat::Pretty {
                println!("{info}\n");
            } else {
                self.output_message(&json!({"type": "LOAD", "load": info}));
            }
        }

        let rows: u64 = loads.iter().map(|l| l.row_count).sum();
        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Loaded {rows} records from {} occupation fields in {}ms",
                    loads.len(),
                    start.elapsed().as_millis()
                )
            }
        }));
        Ok(())
    }

    /// Run the dbt build if a project is present
    async fn transform(&self, config: &PipelineConfig) -> Result<()> {
        let Some(dbt) = DbtRunner::detect(&config.transform) else {
            self.output_message(&json!({
                "type": "LOG",
                "log": {"level": "WARN", "message": "DBT disabled"}
            }));
            return Ok(());
        };

        let info = dbt.build().await?;
        self.output_message(&json!({"type": "TRANSFORM", "transform": info}));
        Ok(())
    }

    /// Run a job, then any jobs its materializations request
    async fn run_job(&self, config: PipelineConfig, job: &str, skip_sensors: bool) -> Result<()> {
        let orchestrator = Orchestrator::new(config);

        let run = orchestrator.run_job(job).await?;
        self.output_message(&json!({"type": "RUN", "run": run}));

        if skip_sensors {
            return Ok(());
        }

        let mut first_error = None;
        for result in orchestrator.tick_sensors().await {
            match result {
                Ok(run) => self.output_message(&json!({"type": "RUN", "run": run})),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Print rows of a table
    fn query(&self, config: &PipelineConfig, table: &str, limit: usize) -> Result<()> {
        let warehouse = Warehouse::open_read_only(&config.warehouse.path)?;
        let rows = warehouse
            .query_table(table, Some(limit))
            .with_context(|| format!("Querying {table}"))?;

        self.output_message(&json!({
            "type": "ROWS",
            "table": table,
            "count": rows.len(),
            "rows": rows
        }));
        Ok(())
    }

    /// List warehouse tables with row counts
    fn tables(&self, config: &PipelineConfig) -> Result<()> {
        let warehouse = Warehouse::open_read_only(&config.warehouse.path)?;

        let tables = warehouse
            .list_tables()?
            .into_iter()
            .map(|name| {
                let rows = warehouse.count_rows(&name)?;
                Ok(json!({"name": name, "rows": rows}))
            })
            .collect::<Result<Vec<Value>>>()?;

        self.output_message(&json!({"type": "TABLES", "tables": tables}));
        Ok(())
    }

    /// Print the orchestration definitions
    fn definitions(&self, config: &PipelineConfig) -> Result<()> {
        let dbt = DbtRunner::detect(&config.transform);
        let defs = Definitions::from_config(config, dbt.is_some());

        self.output_message(&json!({"type": "DEFINITIONS", "definitions": defs}));
        Ok(())
    }

    /// Validate configuration, including the cron expression
    fn validate(&self, config: &PipelineConfig) -> Result<()> {
        tokio_cron_scheduler::Job::new(config.schedule.cron.as_str(), |_uuid, _lock| {})
            .map_err(|e| {
                Error::invalid_value("schedule.cron", format!("'{}': {e}", config.schedule.cron))
            })?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Pipeline '{}' is valid: {} occupation fields into {}",
                    config.pipeline.name,
                    config.source.occupation_fields.len(),
                    config.qualified_table()
                )
            }
        }));
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Pick the requested fields out of the configured ones, keeping config order
fn select_fields(configured: &[String], requested: &str) -> Result<Vec<String>> {
    let requested: Vec<&str> = requested
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if requested.is_empty() {
        return Ok(configured.to_vec());
    }

    if let Some(unknown) = requested.iter().find(|r| !configured.iter().any(|c| c == *r)) {
        return Err(Error::invalid_value(
            "--fields",
            format!("'{unknown}' is not a configured occupation field"),
        ));
    }

    Ok(configured
        .iter()
        .filter(|c| requested.contains(&c.as_str()))
        .cloned()
        .collect())
}
