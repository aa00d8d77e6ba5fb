//! Windowed cron scheduling with process-isolated job execution.
//!
//! Provides a cron job scheduler that is invoked once per minute and:
//! - ⏰ Understands 5-field and seconds-precision cron expressions
//! - 🔁 Repeats jobs within the minute (`repeat_after_seconds`)
//! - 🚀 Starts every job at its due second, concurrently
//! - 🧱 Runs each job in its own child process, or as a tokio task
//! - ❌ Keeps collecting results when individual jobs break
//!
//! ## Quick Start - Cron Expressions
//!
//! ```
//! use metronome_cron::CronExpression;
//!
//! // Parse a cron expression for "every hour"
//! let expr = CronExpression::parse("0 * * * *").unwrap();
//!
//! // Get next execution time
//! let now = chrono::Utc::now();
//! let next = expr.next_after(now);
//!
//! assert!(next.is_some());
//! assert!(next.unwrap() > now);
//! ```
//!
//! ## Cron Expression Presets
//!
//! ```
//! use metronome_cron::expression::{CronExpression, CronPresets};
//!
//! let every_minute = CronExpression::parse(CronPresets::EVERY_MINUTE).unwrap();
//! let every_hour = CronExpression::parse(CronPresets::EVERY_HOUR).unwrap();
//! let daily = CronExpression::parse(CronPresets::DAILY).unwrap();
//!
//! let now = chrono::Utc::now();
//! assert!(every_minute.is_due(now));
//! assert!(every_hour.next_after(now).unwrap() > now);
//! assert!(daily.next_after(now).unwrap() > now);
//! ```
//!
//! ## Complete Example
//!
//! ```no_run
//! use metronome_cron::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CronError> {
//!     let mut manager = SimpleJobManager::new();
//!
//!     // Every minute, then again at seconds 20 and 40
//!     manager.add_job(
//!         "sync",
//!         CommandJob::new("/usr/local/bin/sync-inbox"),
//!         "* * * * *",
//!         Some(20),
//!     )?;
//!
//!     // Every child re-enters this binary as `my-app run-job <id> --json --parameters <json>`
//!     let executable = Executable::new(std::env::current_exe()?).arg("run-job");
//!     let executor = ProcessJobExecutor::new(ProcessExecutorConfig::new(executable));
//!
//!     let scheduler = Scheduler::new(Arc::new(manager), Arc::new(executor));
//!
//!     let mut run = scheduler.run_streamed();
//!     while let Some(summary) = run.next().await {
//!         println!("{} finished: {}", summary.info.name, summary.result.state);
//!     }
//!     run.finish().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod error;
pub mod executor;
pub mod expression;
pub mod job;
pub mod manager;
pub mod protocol;
pub mod runner;
pub mod scheduler;
pub mod status;

pub use clock::{Clock, SystemClock, TokioClock};
pub use error::{
    CronError, CronResult, FailureReason, JobError, JobProcessFailure, ProtocolError, RunFailure,
};
pub use executor::{
    Executable, InProcessJobExecutor, JobExecutor, JobSchedulesBySecond, ProcessExecutorConfig,
    ProcessJobExecutor,
};
pub use expression::{CronExpression, CronPresets};
pub use job::{CallbackJob, CommandJob, Job, JobFn, JobSchedule};
pub use manager::{JobManager, SimpleJobManager};
pub use scheduler::{JobStats, RunHandle, Scheduler, SchedulerConfig};
pub use status::{
    JobId, JobInfo, JobResult, JobResultState, JobSummary, RunParameters, RunSummary,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{CronError, CronResult, JobError, RunFailure};
    pub use crate::executor::{
        Executable, InProcessJobExecutor, JobExecutor, ProcessExecutorConfig, ProcessJobExecutor,
    };
    pub use crate::expression::CronExpression;
    pub use crate::job::{CallbackJob, CommandJob, Job, JobSchedule};
    pub use crate::manager::{JobManager, SimpleJobManager};
    pub use crate::scheduler::{RunHandle, Scheduler, SchedulerConfig};
    pub use crate::status::{JobId, JobResultState, JobSummary, RunParameters, RunSummary};
}
