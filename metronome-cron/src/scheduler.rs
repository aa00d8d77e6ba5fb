//! Cron job scheduler.

use crate::clock::{Clock, SystemClock};
use crate::error::{CronError, CronResult, RunFailure};
use crate::executor::{JobExecutor, JobSchedulesBySecond};
use crate::manager::JobManager;
use crate::runner;
use crate::status::{JobId, JobSummary, RunParameters, RunSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Longest supported run window.
///
/// Expressions are checked against the minute a window starts in, so a longer
/// window would silently skip the following minute.
pub const MAX_WINDOW_SECONDS: u32 = 60;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Length of one run window in seconds
    pub window_seconds: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window_seconds: MAX_WINDOW_SECONDS,
        }
    }
}

impl SchedulerConfig {
    pub fn with_window_seconds(mut self, window_seconds: u32) -> Self {
        self.window_seconds = window_seconds;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> CronResult<()> {
        if self.window_seconds == 0 || self.window_seconds > MAX_WINDOW_SECONDS {
            return Err(CronError::Config(format!(
                "window_seconds must be between 1 and {}, got {}",
                MAX_WINDOW_SECONDS, self.window_seconds
            )));
        }
        Ok(())
    }
}

/// Runs the jobs of a [`JobManager`] through a [`JobExecutor`].
///
/// A scheduler does not keep a timer of its own: the host calls [`run`]
/// once per window (typically every minute from OS cron or a loop), and every
/// job due in that window is started at its second.
///
/// [`run`]: Scheduler::run
pub struct Scheduler {
    manager: Arc<dyn JobManager>,
    executor: Arc<dyn JobExecutor>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler using the system clock and default configuration.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use metronome_cron::*;
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), CronError> {
    /// let mut manager = SimpleJobManager::new();
    /// manager.add_job(
    ///     "heartbeat",
    ///     CallbackJob::new("heartbeat", |params| async move {
    ///         println!("alive at second {}", params.second);
    ///         Ok(())
    ///     }),
    ///     "* * * * *",
    ///     Some(20),
    /// )?;
    ///
    /// let scheduler = Scheduler::new(Arc::new(manager), Arc::new(InProcessJobExecutor::new()));
    /// let summary = scheduler.run().await?;
    /// assert_eq!(summary.summaries.len(), 3);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(manager: Arc<dyn JobManager>, executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            manager,
            executor,
            clock: Arc::new(SystemClock),
            config: SchedulerConfig::default(),
        }
    }

    /// Replace the clock.
    ///
    /// The executor reads its own clock; give both the same one.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> CronResult<Self> {
        config.validate()?;
        debug!("Scheduler config - window_seconds: {}", config.window_seconds);
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<dyn JobManager> {
        &self.manager
    }

    /// Group every job due in the window starting at `window_start` by its
    /// due second.
    pub fn job_schedules_by_second(&self, window_start: DateTime<Utc>) -> JobSchedulesBySecond {
        let mut by_second = JobSchedulesBySecond::new();
        for (id, schedule) in self.manager.scheduled_jobs() {
            for second in schedule.due_seconds(window_start, self.config.window_seconds) {
                by_second
                    .entry(second)
                    .or_default()
                    .push((id.clone(), schedule.clone()));
            }
        }
        by_second
    }

    /// Run one window starting now and wait for every due job.
    pub async fn run(&self) -> Result<RunSummary, RunFailure> {
        self.run_at(self.clock.now()).await
    }

    /// Run one window starting at `window_start`.
    pub async fn run_at(&self, window_start: DateTime<Utc>) -> Result<RunSummary, RunFailure> {
        let jobs = self.job_schedules_by_second(window_start);
        info!("Running {} due job(s)", jobs.values().map(Vec::len).sum::<usize>());

        let (events, _) = mpsc::unbounded_channel();
        self.executor.run_jobs(jobs, window_start, events).await
    }

    /// Run one window starting now in a background task.
    ///
    /// Summaries are available from the returned handle as soon as each job
    /// concludes; the terminal result follows once all of them did.
    pub fn run_streamed(&self) -> RunHandle {
        let window_start = self.clock.now();
        let jobs = self.job_schedules_by_second(window_start);
        info!("Running {} due job(s)", jobs.values().map(Vec::len).sum::<usize>());

        let (events, receiver) = mpsc::unbounded_channel();
        let executor = self.executor.clone();
        let outcome = tokio::spawn(async move { executor.run_jobs(jobs, window_start, events).await });

        RunHandle {
            events: receiver,
            outcome,
        }
    }

    /// Run a single job right away, at run second `0`.
    ///
    /// Without `force`, the job only runs when its expression matches the
    /// current minute; otherwise `Ok(None)` is returned and nothing runs.
    pub async fn run_job(&self, id: &JobId, force: bool) -> CronResult<Option<JobSummary>> {
        self.run_job_with(id, force, RunParameters::new(0)).await
    }

    /// Run a single job with explicit parameters.
    pub async fn run_job_with(
        &self,
        id: &JobId,
        force: bool,
        parameters: RunParameters,
    ) -> CronResult<Option<JobSummary>> {
        let id = &id.normalized();
        let schedule = self
            .manager
            .scheduled_job(id)
            .ok_or_else(|| CronError::JobNotFound(id.clone()))?;

        if !force && !schedule.expression().is_due(self.clock.now()) {
            debug!(job = %id, "Job is not due, skipping");
            return Ok(None);
        }

        Ok(Some(
            runner::execute(id, &schedule, parameters, self.clock.as_ref()).await,
        ))
    }

    /// Get statistics of every registered job.
    pub fn job_stats(&self) -> Vec<JobStats> {
        let now = self.clock.now();
        self.manager
            .scheduled_jobs()
            .into_iter()
            .map(|(id, schedule)| JobStats {
                id,
                name: schedule.job().name(),
                expression: schedule.expression().expression().to_string(),
                repeat_after_seconds: schedule.repeat_after_seconds(),
                next_run: schedule.expression().next_after(now),
            })
            .collect()
    }

    /// Get job statistics.
    pub fn get_stats(&self, id: &JobId) -> CronResult<JobStats> {
        let schedule = self
            .manager
            .scheduled_job(id)
            .ok_or_else(|| CronError::JobNotFound(id.clone()))?;

        Ok(JobStats {
            id: id.clone(),
            name: schedule.job().name(),
            expression: schedule.expression().expression().to_string(),
            repeat_after_seconds: schedule.repeat_after_seconds(),
            next_run: schedule.expression().next_after(self.clock.now()),
        })
    }
}

/// A window running in the background.
pub struct RunHandle {
    events: UnboundedReceiver<JobSummary>,
    outcome: JoinHandle<Result<RunSummary, RunFailure>>,
}

impl RunHandle {
    /// Next collected summary, or `None` once the window concluded.
    pub async fn next(&mut self) -> Option<JobSummary> {
        self.events.recv().await
    }

    /// Wait for the terminal result of the window.
    ///
    /// Summaries not taken through [`next`](RunHandle::next) are still part of
    /// the returned [`RunSummary`].
    pub async fn finish(self) -> CronResult<RunSummary> {
        match self.outcome.await {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(failure)) => Err(failure.into()),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(CronError::Aborted(e.to_string())),
        }
    }
}

/// Job statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub id: JobId,
    pub name: String,
    pub expression: String,
    pub repeat_after_seconds: Option<u32>,
    pub next_run: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::error::JobError;
    use crate::executor::InProcessJobExecutor;
    use crate::job::CallbackJob;
    use crate::manager::SimpleJobManager;
    use crate::status::JobResultState;
    use chrono::TimeZone;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn scheduler(manager: SimpleJobManager) -> Scheduler {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(origin()));
        Scheduler::new(
            Arc::new(manager),
            Arc::new(InProcessJobExecutor::with_clock(clock.clone())),
        )
        .with_clock(clock)
    }

    fn noop(name: &str) -> CallbackJob {
        CallbackJob::new(name, |_| async { Ok(()) })
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(SchedulerConfig::default().window_seconds, 60);
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(SchedulerConfig::default().with_window_seconds(5).validate().is_ok());
        assert!(SchedulerConfig::default().with_window_seconds(0).validate().is_err());
        assert!(SchedulerConfig::default().with_window_seconds(61).validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_schedules_by_second() {
        let mut manager = SimpleJobManager::new();
        manager.add_job("every-20", noop("a"), "* * * * *", Some(20)).unwrap();
        manager.add_job("every-30", noop("b"), "* * * * *", Some(30)).unwrap();
        manager.add_job("at-15", noop("c"), "15 * * * * *", None).unwrap();
        manager.add_job("hourly", noop("d"), "0 * * * *", None).unwrap();

        let scheduler = scheduler(manager);
        let buckets = scheduler.job_schedules_by_second(origin() + chrono::Duration::minutes(1));

        let seconds: Vec<u32> = buckets.keys().copied().collect();
        assert_eq!(seconds, vec![0, 15, 20, 30, 40]);
        assert_eq!(buckets[&0].len(), 2);
        assert_eq!(buckets[&15][0].0, JobId::from("at-15"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_length_limits_buckets() {
        let mut manager = SimpleJobManager::new();
        manager.add_job("every-2", noop("a"), "* * * * *", Some(2)).unwrap();

        let scheduler = scheduler(manager)
            .with_config(SchedulerConfig::default().with_window_seconds(5))
            .unwrap();
        let buckets = scheduler.job_schedules_by_second(origin());

        assert_eq!(buckets.keys().copied().collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_registry_returns_immediately() {
        let scheduler = scheduler(SimpleJobManager::new());
        let summary = scheduler.run().await.unwrap();

        assert!(summary.summaries.is_empty());
        assert_eq!(summary.start, origin());
        assert_eq!(summary.end, origin());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_job_unknown_id() {
        let scheduler = scheduler(SimpleJobManager::new());
        let result = scheduler.run_job(&JobId::from("missing-id"), true).await;
        assert!(matches!(result, Err(CronError::JobNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_job_respects_due_time_without_force() {
        let mut manager = SimpleJobManager::new();
        manager.add_job("yearly", noop("yearly"), "0 0 1 1 *", None).unwrap();
        manager.add_job("always", noop("always"), "* * * * *", None).unwrap();
        let scheduler = scheduler(manager);

        let skipped = scheduler.run_job(&JobId::from("yearly"), false).await.unwrap();
        assert!(skipped.is_none());

        let forced = scheduler.run_job(&JobId::from("yearly"), true).await.unwrap().unwrap();
        assert_eq!(forced.result.state, JobResultState::Done);
        assert_eq!(forced.info.run_second, 0);

        let due = scheduler.run_job(&JobId::from("always"), false).await.unwrap();
        assert!(due.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_job_records_failure_state() {
        let mut manager = SimpleJobManager::new();
        manager
            .add_job(
                JobId::Int(3),
                CallbackJob::new("broken", |_| async { Err(JobError::Failed("nope".to_string())) }),
                "* * * * *",
                None,
            )
            .unwrap();
        let scheduler = scheduler(manager);

        let summary = scheduler
            .run_job_with(&JobId::Int(3), true, RunParameters::new(40))
            .await
            .unwrap()
            .unwrap();

        assert!(summary.is_failed());
        assert_eq!(summary.info.run_second, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_streamed_delivers_each_summary() {
        let mut manager = SimpleJobManager::new();
        manager.add_job("tick", noop("tick"), "* * * * *", Some(20)).unwrap();
        let scheduler = scheduler(manager);

        let mut handle = scheduler.run_streamed();
        let mut seconds = Vec::new();
        while let Some(summary) = handle.next().await {
            seconds.push(summary.info.run_second);
        }
        let summary = handle.finish().await.unwrap();

        assert_eq!(seconds, vec![0, 20, 40]);
        assert_eq!(summary.summaries.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats() {
        let mut manager = SimpleJobManager::new();
        manager.add_job("hourly", noop("Hourly sync"), "0 * * * *", Some(30)).unwrap();
        let scheduler = scheduler(manager);

        let stats = scheduler.get_stats(&JobId::from("hourly")).unwrap();
        assert_eq!(stats.name, "Hourly sync");
        assert_eq!(stats.repeat_after_seconds, Some(30));
        assert_eq!(stats.next_run, Some(origin() + chrono::Duration::hours(1)));

        assert_eq!(scheduler.job_stats().len(), 1);
        assert!(scheduler.get_stats(&JobId::from("missing-id")).is_err());

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["repeatAfterSeconds"], 30);
    }
}
