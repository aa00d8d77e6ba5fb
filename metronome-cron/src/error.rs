//! Error types for scheduling and execution.

use crate::status::{JobId, RunSummary};
use std::fmt;
use thiserror::Error;

/// Result type for scheduler operations.
pub type CronResult<T> = Result<T, CronError>;

/// Scheduler-level errors.
#[derive(Debug, Error)]
pub enum CronError {
    /// Invalid cron expression
    #[error("Invalid cron expression: {0}")]
    InvalidExpression(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Job already exists
    #[error("Job already exists: {0}")]
    JobAlreadyExists(JobId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parent/child payload could not be encoded or decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// One or more job processes could not be understood
    #[error(transparent)]
    Run(#[from] Box<RunFailure>),

    /// The supervising task ended without producing a summary
    #[error("Run aborted: {0}")]
    Aborted(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RunFailure> for CronError {
    fn from(failure: RunFailure) -> Self {
        CronError::Run(Box::new(failure))
    }
}

/// Error returned by a job body. Becomes a `Fail` result, never a run error.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job reported a failure
    #[error("Job execution failed: {0}")]
    Failed(String),

    /// External command exited unsuccessfully
    #[error("Command exited with {}", exit_code_label(.code))]
    Exit { code: Option<i32> },

    /// IO error while running the job
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Errors of the parent/child payload format.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The child wrote nothing to stdout
    #[error("Job subprocess produced no output")]
    Empty,

    /// Payload is not the expected JSON document
    #[error("Malformed job payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload describes another execution than the one that was started
    #[error(
        "Job payload reports job {found_id} at second {found_second}, expected job {expected_id} at second {expected_second}"
    )]
    Mismatch {
        expected_id: JobId,
        expected_second: u32,
        found_id: JobId,
        found_second: u32,
    },
}

/// Why a job process could not be turned into a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The process could not be started
    Spawn,
    /// Waiting on the process or reading its output failed
    Io,
    /// The process output was not a valid payload
    Decode,
    /// The process exceeded its time limit and was killed
    Timeout,
    /// An in-process job panicked
    Panicked,
}

impl FailureReason {
    /// Get reason name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Spawn => "spawn",
            FailureReason::Io => "io",
            FailureReason::Decode => "decode",
            FailureReason::Timeout => "timeout",
            FailureReason::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single execution that produced no usable [`JobSummary`](crate::JobSummary).
#[derive(Debug, Clone, Error)]
#[error("Job {job_id} (second {run_second}) failed [{reason}]: {message}")]
pub struct JobProcessFailure {
    /// Job that was being executed
    pub job_id: JobId,

    /// Run second that triggered the execution
    pub run_second: u32,

    /// Failure category
    pub reason: FailureReason,

    /// Human-readable description
    pub message: String,

    /// Raw captured output, when any was collected
    pub output: Option<String>,
}

impl JobProcessFailure {
    /// Create a failure without captured output.
    pub fn new(
        job_id: JobId,
        run_second: u32,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            run_second,
            reason,
            message: message.into(),
            output: None,
        }
    }

    /// Create a decode failure carrying the child's output.
    pub fn undecodable(job_id: JobId, run_second: u32, output: String, error: ProtocolError) -> Self {
        Self {
            job_id,
            run_second,
            reason: FailureReason::Decode,
            message: format!("{}. Job subprocess failed with following output:\n{}", error, output),
            output: Some(output),
        }
    }
}

/// A run that finished supervising every job but could not decode some of them.
///
/// The wrapped [`RunSummary`] holds every summary that was collected.
#[derive(Debug, Clone)]
pub struct RunFailure {
    /// Partial summary of the run
    pub summary: RunSummary,

    /// Executions that produced no summary, in the order they were observed
    pub failures: Vec<JobProcessFailure>,
}

impl RunFailure {
    /// Create a new run failure.
    pub fn new(summary: RunSummary, failures: Vec<JobProcessFailure>) -> Self {
        Self { summary, failures }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run failed: {} job process(es) could not be decoded ({} completed)",
            self.failures.len(),
            self.summary.summaries.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunFailure {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_cron_error_display() {
        let err = CronError::InvalidExpression("bad cron".to_string());
        assert!(err.to_string().contains("bad cron"));

        let err = CronError::JobNotFound(JobId::from("missing-id"));
        assert_eq!(err.to_string(), "Job not found: missing-id");
    }

    #[test]
    fn test_job_error_exit_display() {
        assert_eq!(
            JobError::Exit { code: Some(3) }.to_string(),
            "Command exited with status 3"
        );
        assert_eq!(
            JobError::Exit { code: None }.to_string(),
            "Command exited with a signal"
        );
    }

    #[test]
    fn test_undecodable_keeps_output() {
        let failure = JobProcessFailure::undecodable(
            JobId::Int(4),
            20,
            "garbage".to_string(),
            ProtocolError::Empty,
        );

        assert_eq!(failure.reason, FailureReason::Decode);
        assert_eq!(failure.output.as_deref(), Some("garbage"));
        assert!(failure.message.contains("garbage"));
    }

    #[test]
    fn test_run_failure_converts_into_cron_error() {
        let now = Utc::now();
        let failure = RunFailure::new(
            RunSummary::new(now, now, Vec::new()),
            vec![JobProcessFailure::new(
                JobId::from("a"),
                0,
                FailureReason::Spawn,
                "no such file",
            )],
        );

        let err: CronError = failure.into();
        match err {
            CronError::Run(failure) => assert_eq!(failure.failures.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
