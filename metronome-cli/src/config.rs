//! Job file loading.
//!
//! ```toml
//! [scheduler]
//! window_seconds = 60
//! idle_backoff_ms = 10
//! executor = "process"     # or "in-process"
//! job_timeout_secs = 300
//!
//! [[jobs]]
//! id = "backup"
//! name = "Nightly backup"
//! expression = "0 3 * * *"
//! command = ["/usr/local/bin/backup", "--full"]
//!
//! [[jobs]]
//! id = 2
//! expression = "* * * * *"
//! repeat_after_seconds = 20
//! command = ["sh", "-c", "curl -fsS https://example.com/ping"]
//! ```

use crate::error::{CliError, CliResult};
use metronome_cron::{
    CommandJob, Executable, InProcessJobExecutor, JobExecutor, JobId, ProcessExecutorConfig,
    ProcessJobExecutor, Scheduler, SchedulerConfig, SimpleJobManager,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Subcommand a child process is started with.
pub const RUN_JOB_COMMAND: &str = "run-job";

/// Contents of a job file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub jobs: Vec<JobEntry>,
}

/// `[scheduler]` table.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSection {
    pub window_seconds: u32,
    pub idle_backoff_ms: u64,
    pub executor: ExecutorKind,
    pub job_timeout_secs: Option<u64>,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            window_seconds: SchedulerConfig::default().window_seconds,
            idle_backoff_ms: 10,
            executor: ExecutorKind::default(),
            job_timeout_secs: None,
        }
    }
}

/// How due jobs are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    /// One child process per execution
    #[default]
    Process,
    /// Tokio tasks inside the running process
    InProcess,
}

/// One `[[jobs]]` entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobEntry {
    pub id: JobId,
    pub name: Option<String>,
    pub expression: String,
    pub repeat_after_seconds: Option<u32>,
    pub command: Vec<String>,
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl JobFile {
    /// Load a job file from disk.
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loaded job file {}", path.display());
        Self::parse(&content)
    }

    /// Parse job file contents.
    pub fn parse(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default().with_window_seconds(self.scheduler.window_seconds)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.scheduler.idle_backoff_ms)
    }

    /// Build the registry of command jobs.
    ///
    /// Ids are normalised the way they are parsed from a command line, so
    /// `id = "42"` and `id = 42` name the same job.
    pub fn build_manager(&self) -> CliResult<SimpleJobManager> {
        let mut manager = SimpleJobManager::new();
        for entry in &self.jobs {
            let id = entry.id.normalized();
            let mut job = CommandJob::from_argv(entry.command.clone())
                .map_err(|e| CliError::Config(format!("job '{}': {}", id, e)))?;
            if let Some(name) = &entry.name {
                job = job.with_name(name);
            }
            if let Some(dir) = &entry.working_dir {
                job = job.working_dir(dir);
            }
            for (key, value) in &entry.env {
                job = job.env(key, value);
            }

            manager
                .add_job(id.clone(), job, &entry.expression, entry.repeat_after_seconds)
                .map_err(|e| CliError::Config(format!("job '{}': {}", id, e)))?;
        }
        Ok(manager)
    }

    /// Build the executor selected in `[scheduler]`.
    ///
    /// The process executor re-enters the running binary as
    /// `<exe> --config <path> run-job`.
    pub fn build_executor(&self, config_path: &Path) -> CliResult<Arc<dyn JobExecutor>> {
        match self.scheduler.executor {
            ExecutorKind::Process => {
                let config_path = std::path::absolute(config_path)?;
                let executable = Executable::new(std::env::current_exe()?)
                    .arg("--config")
                    .arg(config_path.to_string_lossy())
                    .arg(RUN_JOB_COMMAND);

                let mut config =
                    ProcessExecutorConfig::new(executable).with_idle_backoff(self.idle_backoff());
                if let Some(secs) = self.scheduler.job_timeout_secs {
                    config = config.with_timeout(Duration::from_secs(secs));
                }
                Ok(Arc::new(ProcessJobExecutor::new(config)))
            }
            ExecutorKind::InProcess => Ok(Arc::new(
                InProcessJobExecutor::new().with_idle_backoff(self.idle_backoff()),
            )),
        }
    }

    /// Build a ready-to-run scheduler.
    pub fn build_scheduler(&self, config_path: &Path) -> CliResult<Scheduler> {
        let manager = self.build_manager()?;
        let executor = self.build_executor(config_path)?;
        Ok(Scheduler::new(Arc::new(manager), executor).with_config(self.scheduler_config())?)
    }
}
