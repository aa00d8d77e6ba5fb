//! Executors dispatch due jobs and supervise them until every one concludes.
//!
//! Both executors share the same run loop ([`supervise`]); they only differ in
//! how a single execution is started:
//!
//! - [`ProcessJobExecutor`] re-enters the host binary as a child process per
//!   execution and decodes the summary the child prints.
//! - [`InProcessJobExecutor`] runs the job body as a tokio task.

mod in_process;
mod process;

pub use in_process::InProcessJobExecutor;
pub use process::{Executable, ProcessExecutorConfig, ProcessJobExecutor};

use crate::clock::Clock;
use crate::error::{FailureReason, JobProcessFailure, RunFailure};
use crate::job::JobSchedule;
use crate::status::{JobId, JobSummary, RunParameters, RunSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Due jobs keyed by the second of the window they must start at.
pub type JobSchedulesBySecond = BTreeMap<u32, Vec<(JobId, JobSchedule)>>;

/// Default pause of the run loop when an iteration had nothing to do.
///
/// Lower values react faster to due seconds and completions at the cost of
/// more wakeups.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Runs the jobs of one window.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Start every bucket at its second and wait for all executions.
    ///
    /// Each [`JobSummary`] is sent on `events` as soon as it is collected.
    /// Executions that produced no summary are reported together, after
    /// everything else concluded, as a [`RunFailure`].
    async fn run_jobs(
        &self,
        jobs: JobSchedulesBySecond,
        run_start: DateTime<Utc>,
        events: UnboundedSender<JobSummary>,
    ) -> Result<RunSummary, RunFailure>;
}

/// A started execution.
pub(crate) struct Execution {
    job_id: JobId,
    run_second: u32,
    handle: JoinHandle<Result<JobSummary, JobProcessFailure>>,
}

impl Execution {
    pub(crate) fn new(
        job_id: JobId,
        run_second: u32,
        handle: JoinHandle<Result<JobSummary, JobProcessFailure>>,
    ) -> Self {
        Self {
            job_id,
            run_second,
            handle,
        }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    async fn collect(self) -> Result<JobSummary, JobProcessFailure> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(JobProcessFailure::new(
                self.job_id,
                self.run_second,
                FailureReason::Panicked,
                e.to_string(),
            )),
        }
    }
}

/// Whole seconds elapsed since `run_start`, rounded down.
fn elapsed_seconds(clock: &dyn Clock, run_start: DateTime<Utc>) -> i64 {
    (clock.now() - run_start).num_milliseconds().div_euclid(1000)
}

/// The run loop shared by all executors.
///
/// `start` launches one execution without waiting for it; an error means the
/// execution could not be started at all.
pub(crate) async fn supervise<F>(
    mut pending: JobSchedulesBySecond,
    run_start: DateTime<Utc>,
    clock: &dyn Clock,
    idle_backoff: Duration,
    events: &UnboundedSender<JobSummary>,
    mut start: F,
) -> Result<RunSummary, RunFailure>
where
    F: FnMut(&JobId, &JobSchedule, RunParameters) -> Result<Execution, JobProcessFailure>,
{
    let mut running: Vec<Execution> = Vec::new();
    let mut summaries: Vec<JobSummary> = Vec::new();
    let mut failures: Vec<JobProcessFailure> = Vec::new();
    let mut last_executed_second: i64 = -1;

    info!(
        buckets = pending.len(),
        executions = pending.values().map(Vec::len).sum::<usize>(),
        "Starting run window"
    );

    while !pending.is_empty() || !running.is_empty() {
        let mut progressed = false;

        let elapsed = elapsed_seconds(clock, run_start);
        if elapsed > last_executed_second {
            let later = match u32::try_from(elapsed) {
                Ok(second) => pending.split_off(&second.saturating_add(1)),
                Err(_) => BTreeMap::new(),
            };
            let due = std::mem::replace(&mut pending, later);

            for (second, jobs) in due {
                for (id, schedule) in &jobs {
                    debug!(job = %id, second, "Launching job");
                    match start(id, schedule, RunParameters::new(second)) {
                        Ok(execution) => running.push(execution),
                        Err(failure) => {
                            warn!(job = %id, second, "{}", failure);
                            failures.push(failure);
                        }
                    }
                    progressed = true;
                }
            }
            last_executed_second = elapsed;
        }

        let mut index = 0;
        while index < running.len() {
            if !running[index].is_finished() {
                index += 1;
                continue;
            }

            let execution = running.remove(index);
            match execution.collect().await {
                Ok(summary) => {
                    debug!(
                        job = %summary.info.id,
                        second = summary.info.run_second,
                        state = %summary.result.state,
                        "Job finished"
                    );
                    // The receiver may be gone; the summary is still kept.
                    let _ = events.send(summary.clone());
                    summaries.push(summary);
                }
                Err(failure) => {
                    warn!(job = %failure.job_id, second = failure.run_second, "{}", failure);
                    failures.push(failure);
                }
            }
            progressed = true;
        }

        if !progressed {
            tokio::time::sleep(idle_backoff).await;
        }
    }

    let summary = RunSummary::new(run_start, clock.now(), summaries);
    info!(
        completed = summary.summaries.len(),
        failed_jobs = summary.summaries.iter().filter(|s| s.is_failed()).count(),
        process_failures = failures.len(),
        "Run window finished"
    );

    if failures.is_empty() {
        Ok(summary)
    } else {
        Err(RunFailure::new(summary, failures))
    }
}
