//! Periodic cleanup of old jobs.
//!
//! Deletes jobs untouched for longer than the configured retention
//! period. Retention bounds storage growth; it is not part of the job
//! state machine.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use zrep_db::Storage;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the job retention loop until `cancel` is triggered.
pub async fn run_job_retention(
    storage: Arc<dyn Storage>,
    retention_hours: i64,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_hours,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Job retention task started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = interval.tick() => {
                let max_age = chrono::Duration::hours(retention_hours);
                match storage.cleanup_old_jobs(max_age).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Job retention: purged old jobs");
                        } else {
                            tracing::debug!("Job retention: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Job retention: cleanup failed");
                    }
                }
            }
        }
    }
}
