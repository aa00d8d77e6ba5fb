//! Registry of scheduled jobs.

use crate::error::{CronError, CronResult};
use crate::expression::CronExpression;
use crate::job::{Job, JobSchedule};
use crate::status::JobId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves job ids to their schedules.
///
/// Implementations are read-only for the duration of a run and must iterate
/// in a stable order.
pub trait JobManager: Send + Sync {
    /// Look up a single job.
    fn scheduled_job(&self, id: &JobId) -> Option<JobSchedule>;

    /// All registered jobs.
    fn scheduled_jobs(&self) -> Vec<(JobId, JobSchedule)>;

    /// Cron expressions of all registered jobs.
    fn expressions(&self) -> Vec<(JobId, CronExpression)> {
        self.scheduled_jobs()
            .into_iter()
            .map(|(id, schedule)| (id, schedule.expression().clone()))
            .collect()
    }
}

/// In-memory registry populated by the host before a run.
#[derive(Debug, Clone, Default)]
pub struct SimpleJobManager {
    jobs: BTreeMap<JobId, JobSchedule>,
}

impl SimpleJobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job.
    ///
    /// # Examples
    ///
    /// ```
    /// use metronome_cron::*;
    ///
    /// # fn main() -> Result<(), CronError> {
    /// let mut manager = SimpleJobManager::new();
    ///
    /// manager.add_job(
    ///     "cleanup",
    ///     CallbackJob::new("cleanup", |_params| async { Ok(()) }),
    ///     "0 0 * * *", // Every day at midnight
    ///     None,
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_job(
        &mut self,
        id: impl Into<JobId>,
        job: impl Job + 'static,
        expression: &str,
        repeat_after_seconds: Option<u32>,
    ) -> CronResult<()> {
        let expression = CronExpression::parse(expression)?;
        let schedule = JobSchedule::new(Arc::new(job), expression, repeat_after_seconds)?;
        self.add_schedule(id, schedule)
    }

    /// Register an already built schedule.
    ///
    /// The id is stored in its [normalized](JobId::normalized) form.
    pub fn add_schedule(&mut self, id: impl Into<JobId>, schedule: JobSchedule) -> CronResult<()> {
        let id = id.into().normalized();
        if self.jobs.contains_key(&id) {
            return Err(CronError::JobAlreadyExists(id));
        }

        info!(
            "Adding cron job '{}' with schedule '{}'",
            id,
            schedule.expression().expression()
        );
        self.jobs.insert(id.clone(), schedule);
        debug!("Job '{}' registered successfully", id);
        Ok(())
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobManager for SimpleJobManager {
    fn scheduled_job(&self, id: &JobId) -> Option<JobSchedule> {
        self.jobs.get(&id.normalized()).cloned()
    }

    fn scheduled_jobs(&self) -> Vec<(JobId, JobSchedule)> {
        self.jobs
            .iter()
            .map(|(id, schedule)| (id.clone(), schedule.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CallbackJob;

    fn noop(name: &str) -> CallbackJob {
        CallbackJob::new(name, |_| async { Ok(()) })
    }

    #[test]
    fn test_add_and_lookup() {
        let mut manager = SimpleJobManager::new();
        manager.add_job("report", noop("report"), "0 * * * *", None).unwrap();
        manager.add_job(JobId::Int(7), noop("seven"), "* * * * *", Some(30)).unwrap();

        assert_eq!(manager.len(), 2);

        let schedule = manager.scheduled_job(&JobId::from("report")).unwrap();
        assert_eq!(schedule.job().name(), "report");
        assert_eq!(schedule.expression().expression(), "0 * * * *");

        let schedule = manager.scheduled_job(&JobId::Int(7)).unwrap();
        assert_eq!(schedule.repeat_after_seconds(), Some(30));
    }

    #[test]
    fn test_unknown_id() {
        let manager = SimpleJobManager::new();
        assert!(manager.is_empty());
        assert!(manager.scheduled_job(&JobId::from("missing-id")).is_none());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut manager = SimpleJobManager::new();
        manager.add_job("a", noop("a"), "* * * * *", None).unwrap();

        let result = manager.add_job("a", noop("again"), "* * * * *", None);
        assert!(matches!(result, Err(CronError::JobAlreadyExists(_))));
    }

    #[test]
    fn test_numeric_names_share_the_integer_key() {
        let mut manager = SimpleJobManager::new();
        manager
            .add_job(JobId::Name("42".to_string()), noop("a"), "* * * * *", None)
            .unwrap();

        let result = manager.add_job(JobId::Int(42), noop("b"), "* * * * *", None);
        assert!(matches!(result, Err(CronError::JobAlreadyExists(JobId::Int(42)))));
        assert_eq!(manager.len(), 1);

        // A child process receives the id as text and parses it back.
        let (id, _) = manager.scheduled_jobs().remove(0);
        let reentered = JobId::parse(&id.to_string());
        assert_eq!(manager.scheduled_job(&reentered).unwrap().job().name(), "a");
        assert_eq!(
            manager.scheduled_job(&JobId::Name("42".to_string())).unwrap().job().name(),
            "a"
        );
    }

    #[test]
    fn test_invalid_expression_is_rejected() {
        let mut manager = SimpleJobManager::new();
        let result = manager.add_job("a", noop("a"), "not cron", None);
        assert!(matches!(result, Err(CronError::InvalidExpression(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_iteration_is_stable() {
        let mut manager = SimpleJobManager::new();
        for id in ["c", "a", "b"] {
            manager.add_job(id, noop(id), "* * * * *", None).unwrap();
        }

        let first: Vec<JobId> = manager.scheduled_jobs().into_iter().map(|(id, _)| id).collect();
        let second: Vec<JobId> = manager.expressions().into_iter().map(|(id, _)| id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
