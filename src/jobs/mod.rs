// Jobs module - scheduled background work

pub mod cleanup;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Every 15 minutes, on the minute.
pub const CLEANUP_SCHEDULE: &str = "0 */15 * * * *";

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Job error: {0}")]
    Job(String),
}

/// Starts the scheduler with the cleanup job registered. The returned handle
/// must be kept alive for jobs to keep firing.
pub async fn start_scheduler(pool: PgPool) -> Result<JobScheduler, SchedulerError> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

    let job = Job::new_async(CLEANUP_SCHEDULE, move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            cleanup::run_cleanup(&pool).await;
        })
    })
    .map_err(|e| SchedulerError::Job(e.to_string()))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

    scheduler
        .start()
        .await
        .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

    tracing::info!(schedule = CLEANUP_SCHEDULE, "Background scheduler started");
    Ok(scheduler)
}
