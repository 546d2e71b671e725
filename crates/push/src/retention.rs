//! Periodic purge of old terminal notification jobs.
//!
//! Terminal rows are retained for idempotency replay protection and
//! audit, but not forever: this task deletes sent/failed jobs last
//! touched before the retention horizon. Runs on a fixed interval using
//! `tokio::time::interval`.

use std::time::Duration;

use quillcast_db::repositories::NotificationJobRepo;
use quillcast_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Default retention horizon for terminal jobs: 30 days.
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// How often the purge runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the retention sweep loop until `cancel` is triggered.
///
/// The horizon is read from `JOB_RETENTION_DAYS` (defaults to 30).
/// Non-terminal jobs are never touched.
pub async fn run(pool: DbPool, cancel: CancellationToken) {
    let retention_days: i64 = std::env::var("JOB_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS);

    tracing::info!(
        retention_days,
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Job retention sweep started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
                match NotificationJobRepo::delete_terminal_older_than(&pool, cutoff).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Job retention: purged terminal rows");
                        } else {
                            tracing::debug!("Job retention: no rows to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Job retention: sweep failed");
                    }
                }
            }
        }
    }
}
