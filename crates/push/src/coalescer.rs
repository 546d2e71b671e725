//! Event-to-job coalescing on the ingestion path.
//!
//! [`Coalescer`] sits on the synchronous request path of the originating
//! domain action: it derives the event's coalescing window, upserts the
//! window's notification job, and returns. It never attempts delivery —
//! that decoupling is what keeps ingestion rate independent of delivery
//! rate.

use quillcast_core::clock::{Clock, SystemClock};
use quillcast_core::types::DbId;
use quillcast_core::window;
use quillcast_db::models::notification_job::NewJob;
use quillcast_db::models::push_settings::PushPrefs;
use quillcast_db::repositories::{NotificationJobRepo, PushSettingsRepo};
use quillcast_db::DbPool;

use crate::event::PageEvent;

/// How many times to advance the window when the current window's job has
/// already left `pending`. Two advances suffice in practice (the claimed
/// window plus the one being claimed next); the bound guards against a
/// pathological scheduler racing every bucket.
const MAX_WINDOW_ADVANCES: usize = 4;

/// Error type for event ingestion.
#[derive(Debug, thiserror::Error)]
pub enum CoalesceError {
    /// The job store rejected or could not service the upsert.
    #[error(transparent)]
    Db(#[from] sqlx::Error),

    /// Every candidate window's job was already claimed. The event was
    /// not recorded.
    #[error("Could not place event after {0} window advances")]
    WindowContention(usize),
}

/// Folds raw page events into windowed notification jobs.
pub struct Coalescer<C: Clock = SystemClock> {
    pool: DbPool,
    clock: C,
}

impl Coalescer<SystemClock> {
    /// Create a coalescer using the system clock.
    pub fn new(pool: DbPool) -> Self {
        Self::with_clock(pool, SystemClock)
    }
}

impl<C: Clock> Coalescer<C> {
    /// Create a coalescer with an injected clock (used by tests).
    pub fn with_clock(pool: DbPool, clock: C) -> Self {
        Self { pool, clock }
    }

    /// Record one event under the given resolved preferences.
    ///
    /// Returns `Ok(None)` without touching the store when push is
    /// disabled for the user. Otherwise upserts the event into its
    /// window's job atomically; if that window's job has already left
    /// `pending`, advances to the next window so the event is accounted
    /// for in exactly one job.
    pub async fn record_event(
        &self,
        event: &PageEvent,
        prefs: &PushPrefs,
    ) -> Result<Option<DbId>, CoalesceError> {
        if !prefs.enabled {
            return Ok(None);
        }

        let occurred_at = event.occurred_at.unwrap_or_else(|| self.clock.now());
        let mut bounds = window::bounds(prefs.frequency, occurred_at);

        for _ in 0..MAX_WINDOW_ADVANCES {
            let window_key = window::window_key(bounds.bucket_start);
            let input = NewJob {
                user_id: event.user_id,
                workspace_id: event.workspace_id,
                page_id: event.page_id,
                idempotency_key: window::idempotency_key(
                    event.user_id,
                    event.page_id,
                    &window_key,
                ),
                window_key,
                send_after: bounds.send_after,
                fragment: event.fragment.clone(),
            };

            if let Some(job) = NotificationJobRepo::upsert_event(&self.pool, &input).await? {
                tracing::debug!(
                    user_id = event.user_id,
                    page_id = event.page_id,
                    job_id = job.id,
                    events_count = job.events_count,
                    window_key = %job.window_key,
                    "Event folded into notification job"
                );
                return Ok(Some(job.id));
            }

            // The window's job was claimed or finished between the event
            // occurring and the upsert landing; the event belongs to the
            // next window.
            bounds = window::advance(prefs.frequency, bounds);
        }

        Err(CoalesceError::WindowContention(MAX_WINDOW_ADVANCES))
    }

    /// Record one event, resolving the user's stored preferences first.
    pub async fn record_event_for_user(
        &self,
        event: &PageEvent,
    ) -> Result<Option<DbId>, CoalesceError> {
        let prefs = PushSettingsRepo::prefs_for_user(&self.pool, event.user_id).await?;
        self.record_event(event, &prefs).await
    }

    /// Best-effort ingestion for callers that must not fail the
    /// originating domain action.
    ///
    /// Store unavailability is logged and swallowed; the notification is
    /// dropped rather than failing the caller.
    pub async fn record_event_best_effort(&self, event: &PageEvent) -> Option<DbId> {
        match self.record_event_for_user(event).await {
            Ok(job_id) => job_id,
            Err(e) => {
                tracing::error!(
                    user_id = event.user_id,
                    page_id = event.page_id,
                    error = %e,
                    "Dropping page event, notification store unavailable"
                );
                None
            }
        }
    }
}
