//! dbt transformation
//!
//! Runs `dbt build` over the project that shapes the raw job-ad table into
//! models. When no project is present the transform step is skipped rather
//! than failing the pipeline.

use crate::config::TransformConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// File that marks a dbt project directory
pub const DBT_PROJECT_FILE: &str = "dbt_project.yml";

/// Result of a finished dbt invocation
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TransformInfo {
    /// dbt command (e.g. `build`)
    pub command: String,
    /// Project directory
    pub project_dir: PathBuf,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Invokes the dbt CLI for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbtRunner {
    executable: String,
    project_dir: PathBuf,
    profiles_dir: Option<PathBuf>,
}

impl DbtRunner {
    /// Create a runner for `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: "dbt".to_string(),
            project_dir: project_dir.into(),
            profiles_dir: None,
        }
    }

    /// Set the profiles directory
    #[must_use]
    pub fn with_profiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profiles_dir = Some(dir.into());
        self
    }

    /// Set the dbt executable
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Runner for the configured project, or None when transforms are off
    ///
    /// A disabled transform and a directory without `dbt_project.yml` both
    /// yield None after a warning.
    pub fn detect(config: &TransformConfig) -> Option<Self> {
        if !config.enabled {
            warn!("dbt disabled: transform.enabled is false");
            return None;
        }

        let manifest = config.project_dir.join(DBT_PROJECT_FILE);
        if !manifest.is_file() {
            warn!("dbt disabled: no {} in {}", DBT_PROJECT_FILE, config.project_dir.display());
            return None;
        }

        let mut runner = Self::new(&config.project_dir).with_executable(&config.executable);
        if let Some(dir) = &config.profiles_dir {
            runner = runner.with_profiles_dir(dir);
        }
        debug!("dbt project found at {}", runner.project_dir.display());
        Some(runner)
    }

    /// Project directory
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Arguments for a dbt subcommand
    pub fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            command.to_string(),
            "--project-dir".to_string(),
            self.project_dir.to_string_lossy().into_owned(),
        ];
        if let Some(dir) = &self.profiles_dir {
            args.push("--profiles-dir".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }
        args
    }

    /// Run `dbt build`
    pub async fn build(&self) -> Result<TransformInfo> {
        self.run("build").await
    }

    /// Run a dbt subcommand, streaming its output to the log
    pub async fn run(&self, command: &str) -> Result<TransformInfo> {
        let start = Instant::now();
        let args = self.args(command);
        info!("Running {} {}", self.executable, args.join(" "));

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::transform(format!("Failed to start {}: {e}", self.executable)))?;

        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "dbt", "{line}");
                }
            })
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "dbt", "{line}");
                }
            })
        });

        let status = child.wait().await?;
        for task in [stdout, stderr].into_iter().flatten() {
            let _ = task.await;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if !status.success() {
            return Err(Error::transform(format!(
                "dbt {command} exited with {}",
                status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
            )));
        }

        info!("dbt {command} finished in {duration_ms}ms");
        Ok(TransformInfo {
            command: command.to_string(),
            project_dir: self.project_dir.clone(),
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DBT_PROJECT_FILE), "name: job_ads\n").unwrap();
        dir
    }

    #[test]
    fn test_args_with_profiles_dir() {
        let runner = DbtRunner::new("data_transformation").with_profiles_dir("/home/etl/.dbt");
        assert_eq!(
            runner.args("build"),
            vec![
                "build",
                "--project-dir",
                "data_transformation",
                "--profiles-dir",
                "/home/etl/.dbt"
            ]
        );
    }

    #[test]
    fn test_args_without_profiles_dir() {
        let runner = DbtRunner::new("data_transformation");
        assert_eq!(
            runner.args("build"),
            vec!["build", "--project-dir", "data_transformation"]
        );
    }

    #[test]
    fn test_detect_requires_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransformConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(DbtRunner::detect(&config).is_none());
    }

    #[test]
    fn test_detect_disabled() {
        let dir = project();
        let config = TransformConfig {
            enabled: false,
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(DbtRunner::detect(&config).is_none());
    }

    #[test]
    fn test_detect_finds_project() {
        let dir = project();
        let config = TransformConfig {
            project_dir: dir.path().to_path_buf(),
            profiles_dir: Some(PathBuf::from("/etc/dbt")),
            executable: "/opt/dbt/bin/dbt".to_string(),
            ..Default::default()
        };

        let runner = DbtRunner::detect(&config).unwrap();
        assert_eq!(runner.project_dir(), dir.path());
        assert_eq!(runner.executable, "/opt/dbt/bin/dbt");
        assert_eq!(runner.profiles_dir, Some(PathBuf::from("/etc/dbt")));
    }

    #[tokio::test]
    async fn test_missing_executable_is_transform_error() {
        let runner = DbtRunner::new("data_transformation")
            .with_executable("definitely-not-a-dbt-binary-7f3a");
        let err = runner.build().await.unwrap_err();
        assert!(matches!(err, Error::Transform { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_maps_to_result() {
        let ok = DbtRunner::new(".").with_executable("true").build().await.unwrap();
        assert_eq!(ok.command, "build");

        let err = DbtRunner::new(".")
            .with_executable("false")
            .build()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dbt build exited with status 1"));
    }
}
