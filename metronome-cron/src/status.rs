//! Records describing what happened during a run.

use crate::expression::CronExpression;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a job, unique within a [`JobManager`](crate::JobManager).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    /// Numeric identifier
    Int(i64),
    /// Named identifier
    Name(String),
}

impl JobId {
    /// Parse an identifier as it appears on a command line.
    ///
    /// Anything that parses as an integer becomes [`JobId::Int`], so an id
    /// survives the round trip through a child process argument.
    pub fn parse(raw: &str) -> Self {
        raw.parse::<i64>()
            .map(JobId::Int)
            .unwrap_or_else(|_| JobId::Name(raw.to_string()))
    }

    /// The form this id takes after a round trip through [`JobId::parse`].
    ///
    /// `Name("42")` becomes `Int(42)`, so the registry key and the id a
    /// child process receives always agree.
    pub fn normalized(&self) -> Self {
        match self {
            JobId::Name(name) => JobId::parse(name),
            JobId::Int(_) => self.clone(),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Int(id) => write!(f, "{}", id),
            JobId::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for JobId {
    fn from(raw: &str) -> Self {
        JobId::parse(raw)
    }
}

impl From<String> for JobId {
    fn from(raw: String) -> Self {
        JobId::parse(&raw)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId::Int(id)
    }
}

/// Context handed to a job for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Seconds since the run window started when this execution was triggered
    pub second: u32,
}

impl RunParameters {
    /// Create parameters for the given run second.
    pub fn new(second: u32) -> Self {
        Self { second }
    }
}

/// Snapshot taken right before a job body is invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub expression: String,
    pub repeat_after_seconds: Option<u32>,
    pub run_second: u32,
    pub start: DateTime<Utc>,
}

/// Outcome of one execution.
///
/// New states may be added, so downstream matches need a wildcard arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum JobResultState {
    /// Job ran to completion without error
    Done,
    /// Job ran and reported an error
    Fail,
}

impl JobResultState {
    /// Get state name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobResultState::Done => "done",
            JobResultState::Fail => "fail",
        }
    }
}

impl fmt::Display for JobResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result recorded when an execution concludes.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Schedule of the job, kept for next-due computations
    pub expression: CronExpression,
    pub end: DateTime<Utc>,
    pub state: JobResultState,
}

/// One execution attempt.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub info: JobInfo,
    pub result: JobResult,
}

impl JobSummary {
    /// Create a new summary.
    pub fn new(info: JobInfo, result: JobResult) -> Self {
        Self { info, result }
    }

    /// Whether the execution ended in [`JobResultState::Fail`].
    pub fn is_failed(&self) -> bool {
        self.result.state == JobResultState::Fail
    }

    /// Wall time spent in the job body.
    pub fn duration(&self) -> chrono::Duration {
        self.result.end - self.info.start
    }
}

/// Everything that completed during one run window, in completion order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summaries: Vec<JobSummary>,
}

impl RunSummary {
    /// Create a new run summary.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, summaries: Vec<JobSummary>) -> Self {
        Self {
            start,
            end,
            summaries,
        }
    }

    /// Whether any collected execution failed.
    pub fn has_failed_jobs(&self) -> bool {
        self.summaries.iter().any(JobSummary::is_failed)
    }
}
