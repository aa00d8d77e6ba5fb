//! Executor running every job in its own child process.

use super::{DEFAULT_IDLE_BACKOFF, Execution, JobExecutor, JobSchedulesBySecond, supervise};
use crate::clock::{Clock, SystemClock};
use crate::error::{FailureReason, JobProcessFailure, ProtocolError, RunFailure};
use crate::expression::CronExpression;
use crate::job::JobSchedule;
use crate::protocol::{self, JSON_FLAG, PARAMETERS_OPTION};
use crate::status::{JobId, JobSummary, RunParameters, RunSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Command that runs a single job when given `<id> --json --parameters <json>`.
///
/// Usually the host binary itself followed by the subcommand that runs one
/// job, e.g. `metronome --config jobs.toml run-job`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Executable {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a leading argument, placed before the job id.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several leading arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Process executor settings.
#[derive(Debug, Clone)]
pub struct ProcessExecutorConfig {
    /// Entry point re-entered for each execution
    pub executable: Executable,

    /// Kill a child that runs longer than this
    pub timeout: Option<Duration>,

    /// Extra environment for every child
    pub env: HashMap<String, String>,

    /// Pause of the run loop when nothing happened
    pub idle_backoff: Duration,
}

impl ProcessExecutorConfig {
    pub fn new(executable: Executable) -> Self {
        Self {
            executable,
            timeout: None,
            env: HashMap::new(),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }

    /// Set the per-job time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add an environment variable for children.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }
}

/// Runs each execution as `<executable> <id> --json --parameters <json>`.
///
/// A child must print exactly one summary payload on stdout (see
/// [`protocol`](crate::protocol)). Its stderr is relayed to the log and
/// included in the failure report when the payload cannot be decoded.
pub struct ProcessJobExecutor {
    config: ProcessExecutorConfig,
    clock: Arc<dyn Clock>,
}

impl ProcessJobExecutor {
    pub fn new(config: ProcessExecutorConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for window timing.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn command(&self, id: &JobId, parameters: &str) -> Command {
        let executable = &self.config.executable;
        let mut cmd = Command::new(&executable.program);
        cmd.args(&executable.args)
            .arg(id.to_string())
            .arg(JSON_FLAG)
            .arg(PARAMETERS_OPTION)
            .arg(parameters)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn start(
        &self,
        id: &JobId,
        schedule: &JobSchedule,
        parameters: RunParameters,
    ) -> Result<Execution, JobProcessFailure> {
        let second = parameters.second;
        let encoded = protocol::encode_parameters(&parameters).map_err(|e| {
            JobProcessFailure::new(id.clone(), second, FailureReason::Spawn, e.to_string())
        })?;

        let child = self.command(id, &encoded).spawn().map_err(|e| {
            JobProcessFailure::new(
                id.clone(),
                second,
                FailureReason::Spawn,
                format!(
                    "Failed to start '{}': {}",
                    self.config.executable.program.display(),
                    e
                ),
            )
        })?;

        debug!(job = %id, second, pid = ?child.id(), "Job process started");

        let job_id = id.clone();
        let expression = schedule.expression().clone();
        let timeout = self.config.timeout;
        let handle = tokio::spawn(async move {
            let waiting = child.wait_with_output();
            let output = match timeout {
                Some(limit) => match tokio::time::timeout(limit, waiting).await {
                    Ok(output) => output,
                    Err(_) => {
                        return Err(JobProcessFailure::new(
                            job_id,
                            second,
                            FailureReason::Timeout,
                            format!("Job process exceeded {:?} and was killed", limit),
                        ));
                    }
                },
                None => waiting.await,
            };

            let output = output.map_err(|e| {
                JobProcessFailure::new(job_id.clone(), second, FailureReason::Io, e.to_string())
            })?;

            decode_output(job_id, second, output, expression)
        });

        Ok(Execution::new(id.clone(), second, handle))
    }
}

fn decode_output(
    job_id: JobId,
    second: u32,
    output: Output,
    expression: CronExpression,
) -> Result<JobSummary, JobProcessFailure> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    for line in stderr.lines() {
        debug!(job = %job_id, second, "[child] {}", line);
    }

    let decoded = protocol::decode_summary(&stdout, expression).and_then(|summary| {
        let found_id = summary.info.id.normalized();
        if found_id == job_id.normalized() && summary.info.run_second == second {
            Ok(summary)
        } else {
            Err(ProtocolError::Mismatch {
                expected_id: job_id.clone(),
                expected_second: second,
                found_id,
                found_second: summary.info.run_second,
            })
        }
    });

    decoded.map_err(|e| {
        let mut captured = stdout.into_owned();
        if !stderr.is_empty() {
            if !captured.is_empty() && !captured.ends_with('\n') {
                captured.push('\n');
            }
            captured.push_str(&stderr);
        }
        debug!(job = %job_id, second, status = %output.status, "Undecodable job output");
        JobProcessFailure::undecodable(job_id, second, captured, e)
    })
}

#[async_trait]
impl JobExecutor for ProcessJobExecutor {
    async fn run_jobs(
        &self,
        jobs: JobSchedulesBySecond,
        run_start: DateTime<Utc>,
        events: UnboundedSender<JobSummary>,
    ) -> Result<RunSummary, RunFailure> {
        supervise(
            jobs,
            run_start,
            self.clock.as_ref(),
            self.config.idle_backoff,
            &events,
            |id, schedule, parameters| self.start(id, schedule, parameters),
        )
        .await
    }
}
