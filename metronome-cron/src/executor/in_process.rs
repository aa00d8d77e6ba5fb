//! Executor running job bodies as tokio tasks of the current process.

use super::{DEFAULT_IDLE_BACKOFF, Execution, JobExecutor, JobSchedulesBySecond, supervise};
use crate::clock::{Clock, SystemClock};
use crate::error::RunFailure;
use crate::runner;
use crate::status::{JobSummary, RunSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Runs every execution as a task on the current runtime.
///
/// There is no isolation: a job that blocks the thread delays the others. A
/// panicking job is reported as a process failure and does not affect the
/// rest of the window.
pub struct InProcessJobExecutor {
    clock: Arc<dyn Clock>,
    idle_backoff: Duration,
}

impl InProcessJobExecutor {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an executor reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }
}

impl Default for InProcessJobExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobExecutor for InProcessJobExecutor {
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
            self.idle_backoff,
            &events,
            |id, schedule, parameters| {
                let (job_id, schedule, clock) = (id.clone(), schedule.clone(), self.clock.clone());
                let handle = tokio::spawn(async move {
                    Ok(runner::execute(&job_id, &schedule, parameters, clock.as_ref()).await)
                });
                Ok(Execution::new(id.clone(), parameters.second, handle))
            },
        )
        .await
    }
}
