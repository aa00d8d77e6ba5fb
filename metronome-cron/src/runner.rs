//! Runs a single job body and records its outcome.

use crate::clock::Clock;
use crate::job::JobSchedule;
use crate::status::{JobId, JobInfo, JobResult, JobResultState, JobSummary, RunParameters};
use tracing::{debug, warn};

/// Execute one job and build its summary.
///
/// The info snapshot is taken before the body starts. An error returned by
/// the body is logged and recorded as [`JobResultState::Fail`]; it never
/// escapes as an error.
pub async fn execute(
    id: &JobId,
    schedule: &JobSchedule,
    parameters: RunParameters,
    clock: &dyn Clock,
) -> JobSummary {
    let info = JobInfo {
        id: id.clone(),
        name: schedule.job().name(),
        expression: schedule.expression().expression().to_string(),
        repeat_after_seconds: schedule.repeat_after_seconds(),
        run_second: parameters.second,
        start: clock.now(),
    };

    debug!(job = %id, second = parameters.second, "Executing job '{}'", info.name);

    let state = match schedule.job().run(parameters).await {
        Ok(()) => JobResultState::Done,
        Err(e) => {
            warn!(job = %id, second = parameters.second, "Job '{}' failed: {}", info.name, e);
            JobResultState::Fail
        }
    };

    let result = JobResult {
        expression: schedule.expression().clone(),
        end: clock.now(),
        state,
    };

    JobSummary::new(info, result)
}
