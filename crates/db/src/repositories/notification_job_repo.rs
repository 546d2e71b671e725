//! Repository for the `notification_jobs` table.
//!
//! Every operation that decides a job's fate is a single conditional SQL
//! statement — the upsert-or-advance fold, the batch claim, and the
//! terminal transitions are all safe under concurrent writers without any
//! read-then-write sequence in Rust.

use quillcast_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::notification_job::{NewJob, NotificationJob};
use crate::models::status::{JobStatus, TERMINAL_STATUSES};

/// Column list for `notification_jobs` queries.
const COLUMNS: &str = "\
    id, user_id, workspace_id, page_id, window_key, idempotency_key, \
    status_id, send_after, events_count, payload, \
    delivery_attempts, last_error, claimed_at, sent_at, \
    created_at, updated_at";

/// Upper bound on the `summary` list kept inside the payload JSONB.
const MAX_SUMMARY_ITEMS: i32 = 10;

/// Provides atomic job-state operations for the coalescer and scheduler.
pub struct NotificationJobRepo;

impl NotificationJobRepo {
    /// Fold one event into its window's job, atomically.
    ///
    /// Attempts an insert with `events_count = 1`; on an idempotency-key
    /// conflict the existing row's `events_count` is incremented and the
    /// payload merged (most recent fragment wins `latest`, and is appended
    /// to the bounded `summary` list, dropping the oldest entry past the
    /// cap) — but only while the row is still `pending`.
    ///
    /// Returns `None` when the conflicting row has already left `pending`
    /// (claimed or terminal): the caller must advance to the next window
    /// and retry so the event is not silently dropped.
    pub async fn upsert_event(
        pool: &PgPool,
        input: &NewJob,
    ) -> Result<Option<NotificationJob>, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_jobs \
                 (user_id, workspace_id, page_id, window_key, idempotency_key, \
                  status_id, send_after, events_count, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 1, \
                     jsonb_build_object('latest', $8::jsonb, \
                                        'summary', jsonb_build_array($8::jsonb))) \
             ON CONFLICT (idempotency_key) DO UPDATE SET \
                 events_count = notification_jobs.events_count + 1, \
                 payload = jsonb_build_object( \
                     'latest', EXCLUDED.payload->'latest', \
                     'summary', CASE \
                         WHEN jsonb_array_length(notification_jobs.payload->'summary') >= $9 \
                         THEN ((notification_jobs.payload->'summary') - 0) \
                              || jsonb_build_array(EXCLUDED.payload->'latest') \
                         ELSE (notification_jobs.payload->'summary') \
                              || jsonb_build_array(EXCLUDED.payload->'latest') \
                     END), \
                 updated_at = NOW() \
             WHERE notification_jobs.status_id = $6 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationJob>(&query)
            .bind(input.user_id)
            .bind(input.workspace_id)
            .bind(input.page_id)
            .bind(&input.window_key)
            .bind(&input.idempotency_key)
            .bind(JobStatus::Pending.id())
            .bind(input.send_after)
            .bind(&input.fragment)
            .bind(MAX_SUMMARY_ITEMS)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim a bounded batch of due jobs for dispatch.
    ///
    /// Transitions `pending -> sending` and increments `delivery_attempts`
    /// in one statement, using `FOR UPDATE SKIP LOCKED` so that at most one
    /// dispatcher instance ever claims a given job. Due-ness is judged
    /// against the caller-supplied `now` (injected clock).
    pub async fn claim_due_batch(
        pool: &PgPool,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<NotificationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE notification_jobs \
             SET status_id = $1, claimed_at = NOW(), \
                 delivery_attempts = delivery_attempts + 1, \
                 updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM notification_jobs \
                 WHERE status_id = $2 AND send_after <= $3 \
                 ORDER BY send_after ASC \
                 LIMIT $4 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationJob>(&query)
            .bind(JobStatus::Sending.id())
            .bind(JobStatus::Pending.id())
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark a claimed job as successfully sent.
    ///
    /// Conditional on the job still being in `sending`; returns `false`
    /// when no transition happened.
    pub async fn mark_sent(
        pool: &PgPool,
        job_id: DbId,
        sent_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_jobs \
             SET status_id = $2, sent_at = $3, last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Sent.id())
        .bind(sent_at)
        .bind(JobStatus::Sending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a claimed job as terminally failed with a reason.
    pub async fn mark_failed(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_jobs \
             SET status_id = $2, last_error = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Sending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return a claimed job to `pending` with a deferred `send_after`.
    ///
    /// Used when every delivery attempt in a tick failed transiently: the
    /// job becomes eligible again once the deferral elapses, and keeps its
    /// `delivery_attempts` count so the dispatcher can bound retries.
    pub async fn release_to_pending(
        pool: &PgPool,
        job_id: DbId,
        send_after: Timestamp,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_jobs \
             SET status_id = $2, send_after = $3, last_error = $4, \
                 claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(job_id)
        .bind(JobStatus::Pending.id())
        .bind(send_after)
        .bind(error)
        .bind(JobStatus::Sending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count jobs stuck in `sending` since before `cutoff`.
    ///
    /// Operator visibility: a nonzero count past the staleness threshold
    /// means a dispatcher died mid-flight and the rows need attention.
    pub async fn count_stale_sending(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_jobs \
             WHERE status_id = $1 AND claimed_at < $2",
        )
        .bind(JobStatus::Sending.id())
        .bind(cutoff)
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Delete terminal (sent/failed) jobs last touched before `cutoff`.
    ///
    /// Returns the number of purged rows. Non-terminal rows are never
    /// deleted.
    pub async fn delete_terminal_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notification_jobs \
             WHERE status_id IN ($1, $2) AND updated_at < $3",
        )
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NotificationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notification_jobs WHERE id = $1");
        sqlx::query_as::<_, NotificationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its idempotency key.
    pub async fn find_by_idempotency_key(
        pool: &PgPool,
        idempotency_key: &str,
    ) -> Result<Option<NotificationJob>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM notification_jobs WHERE idempotency_key = $1");
        sqlx::query_as::<_, NotificationJob>(&query)
            .bind(idempotency_key)
            .fetch_optional(pool)
            .await
    }

    /// List every job for a `(user, page)` pair, oldest window first.
    pub async fn list_for_page(
        pool: &PgPool,
        user_id: DbId,
        page_id: DbId,
    ) -> Result<Vec<NotificationJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_jobs \
             WHERE user_id = $1 AND page_id = $2 \
             ORDER BY send_after ASC, id ASC"
        );
        sqlx::query_as::<_, NotificationJob>(&query)
            .bind(user_id)
            .bind(page_id)
            .fetch_all(pool)
            .await
    }

    /// Total events accounted for across all jobs of a `(user, page)` pair.
    ///
    /// Together with [`list_for_page`](Self::list_for_page) this backs the
    /// "no event is lost" accounting check.
    pub async fn sum_events_for_page(
        pool: &PgPool,
        user_id: DbId,
        page_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let sum: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(events_count)::BIGINT FROM notification_jobs \
             WHERE user_id = $1 AND page_id = $2",
        )
        .bind(user_id)
        .bind(page_id)
        .fetch_one(pool)
        .await?;
        Ok(sum.unwrap_or(0))
    }
}
