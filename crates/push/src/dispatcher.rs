//! Due-job scheduling and push delivery.
//!
//! [`Scheduler`] runs as a background task: each tick atomically claims a
//! bounded batch of due jobs (`pending -> sending`, safe under multiple
//! scheduler replicas) and dispatches each one to the user's active
//! subscriptions through the injected [`PushSender`].
//!
//! Terminal policy:
//! - zero active subscriptions: the job ends `sent` with zero deliveries
//!   ("no device means nothing to deliver", not an error);
//! - at least one successful delivery: `sent`, even if other endpoints
//!   failed permanently (those are revoked individually);
//! - every attempted endpoint failed permanently: `failed`;
//! - every attempted endpoint failed transiently: the job is released
//!   back to `pending` with a deferred `send_after`, up to
//!   [`SchedulerConfig::max_delivery_attempts`], then `failed` without
//!   revoking anything.

use std::time::Duration;

use quillcast_core::clock::{Clock, SystemClock};
use quillcast_db::models::notification_job::NotificationJob;
use quillcast_db::models::push_subscription::PushSubscription;
use quillcast_db::repositories::{NotificationJobRepo, PushSubscriptionRepo};
use quillcast_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::sender::{PushSender, SendOutcome, WebPushSender};

/// Tunables for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the due-job scan runs.
    pub poll_interval: Duration,

    /// Maximum number of jobs claimed per tick.
    pub batch_size: i64,

    /// Job-level attempt bound for all-transient ticks; counted by the
    /// `delivery_attempts` column, incremented on every claim.
    pub max_delivery_attempts: i32,

    /// Base deferral applied when a job is released back to `pending`
    /// after an all-transient tick; scaled by the attempt number.
    pub retry_defer: chrono::Duration,

    /// Inline per-send retry delays on transient failure within one tick.
    pub transient_retry_delays: Vec<Duration>,

    /// A job still in `sending` this long after its claim is considered
    /// stuck (a dispatcher died mid-flight); surfaced as a warning.
    pub stale_after: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 50,
            max_delivery_attempts: 5,
            retry_defer: chrono::Duration::seconds(60),
            transient_retry_delays: vec![Duration::from_secs(1), Duration::from_secs(2)],
            stale_after: chrono::Duration::minutes(10),
        }
    }
}

impl SchedulerConfig {
    /// Build a config from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_parse::<u64>("PUSH_POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(size) = env_parse::<i64>("PUSH_BATCH_SIZE") {
            config.batch_size = size;
        }
        if let Some(attempts) = env_parse::<i32>("PUSH_MAX_DELIVERY_ATTEMPTS") {
            config.max_delivery_attempts = attempts;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Tally of per-subscription outcomes for one job dispatch.
#[derive(Debug, Default)]
struct DispatchTally {
    delivered: usize,
    permanent: usize,
    transient: usize,
    last_error: Option<String>,
}

/// Background service that claims due notification jobs and delivers them.
pub struct Scheduler<S: PushSender, C: Clock = SystemClock> {
    pool: DbPool,
    sender: S,
    clock: C,
    config: SchedulerConfig,
}

impl<S: PushSender> Scheduler<S, SystemClock> {
    /// Create a scheduler using the system clock.
    pub fn new(pool: DbPool, sender: S, config: SchedulerConfig) -> Self {
        Self::with_clock(pool, sender, config, SystemClock)
    }
}

impl Scheduler<WebPushSender, SystemClock> {
    /// Create a scheduler with the bundled HTTP sender and default config.
    pub fn web_push(pool: DbPool) -> Self {
        Self::new(pool, WebPushSender::new(), SchedulerConfig::from_env())
    }
}

impl<S: PushSender, C: Clock> Scheduler<S, C> {
    /// Create a scheduler with an injected clock (used by tests).
    pub fn with_clock(pool: DbPool, sender: S, config: SchedulerConfig, clock: C) -> Self {
        Self {
            pool,
            sender,
            clock,
            config,
        }
    }

    /// Run the scheduler loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Push scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Push scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Push scheduler tick failed");
                    }
                }
            }
        }
    }

    /// One scheduler pass: claim due jobs and dispatch each.
    ///
    /// Returns the number of jobs claimed this tick.
    pub async fn tick(&self) -> Result<usize, sqlx::Error> {
        self.warn_on_stale_jobs().await?;

        let now = self.clock.now();
        let jobs =
            NotificationJobRepo::claim_due_batch(&self.pool, now, self.config.batch_size).await?;

        for job in &jobs {
            if let Err(e) = self.dispatch(job).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to dispatch job");
            }
        }

        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "Dispatched due notification jobs");
        }

        Ok(jobs.len())
    }

    /// Deliver one claimed job to all of the user's active subscriptions
    /// and settle its terminal status.
    async fn dispatch(&self, job: &NotificationJob) -> Result<(), sqlx::Error> {
        let subscriptions =
            PushSubscriptionRepo::list_active_for_user(&self.pool, job.user_id).await?;

        if subscriptions.is_empty() {
            // No device means nothing to deliver; events_count is kept
            // for audit.
            NotificationJobRepo::mark_sent(&self.pool, job.id, self.clock.now()).await?;
            tracing::debug!(
                job_id = job.id,
                user_id = job.user_id,
                "Job sent with zero deliveries, no active subscriptions"
            );
            return Ok(());
        }

        let payload = serde_json::to_vec(&job.payload).unwrap_or_default();
        let mut tally = DispatchTally::default();

        for subscription in &subscriptions {
            match self.send_with_retry(subscription, &payload).await {
                SendOutcome::Delivered => tally.delivered += 1,
                SendOutcome::PermanentFailure(reason) => {
                    tally.permanent += 1;
                    self.revoke(&subscription.endpoint, &reason).await?;
                    tally.last_error = Some(reason);
                }
                SendOutcome::TransientFailure(reason) => {
                    tally.transient += 1;
                    tally.last_error = Some(reason);
                }
            }
        }

        self.settle(job, &tally).await
    }

    /// Attempt one send, retrying inline on transient failure.
    async fn send_with_retry(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> SendOutcome {
        let mut outcome = self.sender.send(subscription, payload).await;

        for delay in &self.config.transient_retry_delays {
            match outcome {
                SendOutcome::TransientFailure(ref reason) => {
                    tracing::warn!(
                        endpoint = %subscription.endpoint,
                        reason = %reason,
                        delay_secs = delay.as_secs(),
                        "Transient push failure, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                    outcome = self.sender.send(subscription, payload).await;
                }
                _ => break,
            }
        }

        outcome
    }

    /// Mark a dead endpoint revoked (the revocation handler path).
    async fn revoke(&self, endpoint: &str, reason: &str) -> Result<(), sqlx::Error> {
        let revoked = PushSubscriptionRepo::revoke_endpoint(&self.pool, endpoint).await?;
        if revoked {
            tracing::warn!(endpoint, reason, "Push subscription revoked");
        }
        Ok(())
    }

    /// Translate the dispatch tally into the job's next state.
    async fn settle(&self, job: &NotificationJob, tally: &DispatchTally) -> Result<(), sqlx::Error> {
        if tally.delivered > 0 {
            NotificationJobRepo::mark_sent(&self.pool, job.id, self.clock.now()).await?;
            tracing::debug!(
                job_id = job.id,
                delivered = tally.delivered,
                permanent = tally.permanent,
                transient = tally.transient,
                "Job sent"
            );
            return Ok(());
        }

        let error = tally
            .last_error
            .as_deref()
            .unwrap_or("No delivery succeeded");

        if tally.transient > 0 && job.delivery_attempts < self.config.max_delivery_attempts {
            // Everything that did not fail permanently may still clear;
            // defer and try the whole job again later.
            let defer = self.config.retry_defer * job.delivery_attempts;
            let send_after = self.clock.now() + defer;
            NotificationJobRepo::release_to_pending(&self.pool, job.id, send_after, error)
                .await?;
            tracing::warn!(
                job_id = job.id,
                attempt = job.delivery_attempts,
                defer_secs = defer.num_seconds(),
                "All deliveries failed transiently, job deferred"
            );
            return Ok(());
        }

        NotificationJobRepo::mark_failed(&self.pool, job.id, error).await?;
        tracing::warn!(
            job_id = job.id,
            permanent = tally.permanent,
            transient = tally.transient,
            "Job failed, no delivery succeeded"
        );
        Ok(())
    }

    /// Surface jobs stuck in `sending` past the staleness threshold.
    async fn warn_on_stale_jobs(&self) -> Result<(), sqlx::Error> {
        let cutoff = self.clock.now() - self.config.stale_after;
        let stale = NotificationJobRepo::count_stale_sending(&self.pool, cutoff).await?;
        if stale > 0 {
            tracing::warn!(
                count = stale,
                stale_after_secs = self.config.stale_after.num_seconds(),
                "Jobs stuck in sending past the staleness threshold"
            );
        }
        Ok(())
    }
}
