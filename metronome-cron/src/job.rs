//! Job definitions and their schedules.

use crate::error::{CronError, CronResult, JobError};
use crate::expression::CronExpression;
use crate::status::RunParameters;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the run second into command jobs.
pub const RUN_SECOND_ENV: &str = "METRONOME_RUN_SECOND";

/// Job execution function type.
pub type JobFn = Arc<
    dyn Fn(RunParameters) -> Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>
        + Send
        + Sync,
>;

/// A unit of work the scheduler can run.
#[async_trait]
pub trait Job: Send + Sync {
    /// Display name.
    fn name(&self) -> String;

    /// Run the job body once.
    async fn run(&self, parameters: RunParameters) -> Result<(), JobError>;
}

/// Job backed by an async closure.
pub struct CallbackJob {
    name: String,
    function: JobFn,
}

impl CallbackJob {
    /// Create a new callback job.
    ///
    /// # Examples
    ///
    /// ```
    /// use metronome_cron::CallbackJob;
    ///
    /// let job = CallbackJob::new("cleanup", |params| async move {
    ///     println!("cleanup triggered at second {}", params.second);
    ///     Ok(())
    /// });
    /// ```
    pub fn new<F, Fut>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(RunParameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let wrapped_fn = Arc::new(
            move |params: RunParameters| -> Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>> {
                Box::pin(function(params))
            },
        );

        Self {
            name: name.into(),
            function: wrapped_fn,
        }
    }
}

#[async_trait]
impl Job for CallbackJob {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(&self, parameters: RunParameters) -> Result<(), JobError> {
        (self.function)(parameters).await
    }
}

/// Job that runs an external command line.
///
/// Output of the command is captured and logged, never passed through, so it
/// cannot interfere with the payload a child process writes to stdout.
#[derive(Debug, Clone)]
pub struct CommandJob {
    name: Option<String>,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env_vars: HashMap<String, String>,
}

impl CommandJob {
    /// Create a command job.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            name: None,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env_vars: HashMap::new(),
        }
    }

    /// Create a command job from a full argument vector.
    pub fn from_argv(argv: Vec<String>) -> CronResult<Self> {
        let mut parts = argv.into_iter();
        let program = parts
            .next()
            .filter(|program| !program.is_empty())
            .ok_or_else(|| CronError::Config("Command must not be empty".to_string()))?;

        Ok(Self::new(program).args(parts))
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Full command line, space separated.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Job for CommandJob {
    fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.command_line())
    }

    async fn run(&self, parameters: RunParameters) -> Result<(), JobError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env_vars)
            .env(RUN_SECOND_ENV, parameters.second.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await?;
        let name = self.name();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(job = %name, "[stdout] {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(job = %name, "[stderr] {}", line);
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(JobError::Exit {
                code: output.status.code(),
            })
        }
    }
}

/// A job together with when it should run.
#[derive(Clone)]
pub struct JobSchedule {
    job: Arc<dyn Job>,
    expression: CronExpression,
    repeat_after_seconds: Option<u32>,
}

impl JobSchedule {
    /// Create a schedule. `repeat_after_seconds` must be positive when set.
    pub fn new(
        job: Arc<dyn Job>,
        expression: CronExpression,
        repeat_after_seconds: Option<u32>,
    ) -> CronResult<Self> {
        if repeat_after_seconds == Some(0) {
            return Err(CronError::Config(
                "repeat_after_seconds must be a positive number of seconds".to_string(),
            ));
        }

        Ok(Self {
            job,
            expression,
            repeat_after_seconds,
        })
    }

    /// The job itself.
    pub fn job(&self) -> &Arc<dyn Job> {
        &self.job
    }

    pub fn expression(&self) -> &CronExpression {
        &self.expression
    }

    pub fn repeat_after_seconds(&self) -> Option<u32> {
        self.repeat_after_seconds
    }

    /// Seconds of the window `[0, window_seconds)` at which this job is due.
    ///
    /// The expression is checked once, against the minute containing
    /// `window_start`. Its first execution in that minute gives the first due
    /// second (or `0` when that moment already passed); the repeat interval
    /// then adds every following multiple until the window ends.
    pub fn due_seconds(&self, window_start: DateTime<Utc>, window_seconds: u32) -> Vec<u32> {
        let Some(first) = self.expression.first_in_minute(window_start) else {
            return Vec::new();
        };

        let delta_ms = (first - window_start).num_milliseconds();
        let offset = if delta_ms <= 0 {
            0
        } else {
            u32::try_from((delta_ms + 999) / 1000).unwrap_or(u32::MAX)
        };

        if offset >= window_seconds {
            return Vec::new();
        }

        match self.repeat_after_seconds {
            None => vec![offset],
            Some(step) => (offset..window_seconds).step_by(step as usize).collect(),
        }
    }
}

impl fmt::Debug for JobSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSchedule")
            .field("job", &self.job.name())
            .field("expression", &self.expression.expression())
            .field("repeat_after_seconds", &self.repeat_after_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn noop() -> Arc<dyn Job> {
        Arc::new(CallbackJob::new("noop", |_| async { Ok(()) }))
    }

    fn schedule(expression: &str, repeat: Option<u32>) -> JobSchedule {
        JobSchedule::new(noop(), CronExpression::parse(expression).unwrap(), repeat).unwrap()
    }

    fn at(m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, m, s).unwrap()
    }

    #[tokio::test]
    async fn test_callback_job_receives_parameters() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();
        let job = CallbackJob::new("ctx_test", move |params| {
            let seen = seen_clone.clone();
            async move {
                seen.store(params.second, Ordering::SeqCst);
                Ok(())
            }
        });

        assert_eq!(job.name(), "ctx_test");
        job.run(RunParameters::new(40)).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn test_callback_job_failure() {
        let job = CallbackJob::new("failure", |_| async {
            Err(JobError::Failed("test error".to_string()))
        });

        let result = job.run(RunParameters::new(0)).await;
        assert!(matches!(result, Err(JobError::Failed(_))));
    }

    #[tokio::test]
    async fn test_command_job_exit_status() {
        let ok = CommandJob::new("sh").arg("-c").arg("exit 0");
        assert!(ok.run(RunParameters::new(0)).await.is_ok());

        let failing = CommandJob::new("sh").arg("-c").arg("exit 3");
        let result = failing.run(RunParameters::new(0)).await;
        assert!(matches!(result, Err(JobError::Exit { code: Some(3) })));
    }

    #[tokio::test]
    async fn test_command_job_sees_run_second() {
        let job = CommandJob::new("sh")
            .arg("-c")
            .arg(format!("test \"${}\" = 20", RUN_SECOND_ENV));

        assert!(job.run(RunParameters::new(20)).await.is_ok());
        assert!(job.run(RunParameters::new(21)).await.is_err());
    }

    #[tokio::test]
    async fn test_command_job_missing_program() {
        let job = CommandJob::new("/nonexistent/metronome-test-binary");
        let result = job.run(RunParameters::new(0)).await;
        assert!(matches!(result, Err(JobError::Io(_))));
    }

    #[test]
    fn test_command_job_name() {
        let job = CommandJob::from_argv(vec!["echo".into(), "hi".into()]).unwrap();
        assert_eq!(job.name(), "echo hi");
        assert_eq!(job.with_name("greeter").name(), "greeter");

        assert!(CommandJob::from_argv(Vec::new()).is_err());
    }

    #[test]
    fn test_zero_repeat_is_rejected() {
        let result = JobSchedule::new(noop(), CronExpression::parse("* * * * *").unwrap(), Some(0));
        assert!(matches!(result, Err(CronError::Config(_))));
    }

    #[test]
    fn test_due_once_without_repeat() {
        let due = schedule("* * * * *", None).due_seconds(at(0, 0), 60);
        assert_eq!(due, vec![0]);
    }

    #[test]
    fn test_due_with_repeat() {
        let due = schedule("* * * * *", Some(20)).due_seconds(at(0, 0), 60);
        assert_eq!(due, vec![0, 20, 40]);

        let due = schedule("* * * * *", Some(7)).due_seconds(at(0, 0), 60);
        assert_eq!(due, vec![0, 7, 14, 21, 28, 35, 42, 49, 56]);
    }

    #[test]
    fn test_due_not_in_window_minute() {
        let due = schedule("0 * * * *", Some(10)).due_seconds(at(1, 0), 60);
        assert!(due.is_empty());
    }

    #[test]
    fn test_due_second_field_offsets_first_run() {
        let due = schedule("30 * * * * *", Some(15)).due_seconds(at(0, 0), 60);
        assert_eq!(due, vec![30, 45]);
    }

    #[test]
    fn test_late_window_still_runs_at_zero() {
        let due = schedule("* * * * *", Some(20)).due_seconds(at(0, 5), 60);
        assert_eq!(due, vec![0, 20, 40]);
    }

    #[test]
    fn test_due_fractional_start_rounds_up() {
        let start = at(0, 0) + chrono::Duration::milliseconds(700);
        let due = schedule("30 * * * * *", None).due_seconds(start, 60);
        assert_eq!(due, vec![30]);
    }

    #[test]
    fn test_due_respects_window_length() {
        let due = schedule("* * * * *", Some(1)).due_seconds(at(0, 0), 3);
        assert_eq!(due, vec![0, 1, 2]);

        let due = schedule("45 * * * * *", None).due_seconds(at(0, 0), 30);
        assert!(due.is_empty());
    }
}
