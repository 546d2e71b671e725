//! Coalescing-window bucket math and key derivation.
//!
//! Events for a `(user, page)` pair are folded into fixed time buckets
//! sized by the user's [`PushFrequency`]. A bucket is identified by its
//! start instant, formatted deterministically as the job's `window_key`;
//! the globally unique `idempotency_key` is a SHA-256 digest over
//! `(user_id, page_id, window_key)` and backs the uniqueness constraint
//! that guarantees at most one live job per window.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::frequency::PushFrequency;
use crate::hashing::sha256_hex;
use crate::types::{DbId, Timestamp};

/// Deterministic `window_key` format: microsecond precision, so the
/// immediate preference (bucket = event instant) stays unambiguous and
/// survives the round-trip through a Postgres `timestamptz` column.
const WINDOW_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// The time bounds of one coalescing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    /// Start of the bucket containing the event.
    pub bucket_start: Timestamp,
    /// When the window's job becomes eligible for dispatch (the bucket
    /// end, or the event instant itself for the immediate preference).
    pub send_after: Timestamp,
}

/// Compute the window containing `occurred_at` for the given preference.
///
/// For delayed preferences the bucket start is the wall clock truncated to
/// the bucket size (buckets are aligned to the Unix epoch, so the hourly
/// bucket containing `10:42:10` starts at `10:00:00`). For `Immediate`
/// every event gets its own zero-length bucket and is due at once.
pub fn bounds(frequency: PushFrequency, occurred_at: Timestamp) -> WindowBounds {
    match frequency.window() {
        None => WindowBounds {
            bucket_start: truncate_to_micros(occurred_at),
            send_after: truncate_to_micros(occurred_at),
        },
        Some(window) => {
            let bucket_start = truncate_to_window(occurred_at, window);
            WindowBounds {
                bucket_start,
                send_after: bucket_start + window,
            }
        }
    }
}

/// Advance to the window immediately following `current`.
///
/// Used when the current window's job has already left `pending`: the new
/// event must land in the next bucket so it is never silently dropped. For
/// `Immediate` the advance is one microsecond, the smallest step the
/// stored timestamp resolution can distinguish.
pub fn advance(frequency: PushFrequency, current: WindowBounds) -> WindowBounds {
    match frequency.window() {
        None => {
            let bucket_start = current.bucket_start + Duration::microseconds(1);
            WindowBounds {
                bucket_start,
                send_after: bucket_start,
            }
        }
        Some(window) => {
            let bucket_start = current.bucket_start + window;
            WindowBounds {
                bucket_start,
                send_after: bucket_start + window,
            }
        }
    }
}

/// Format a bucket start as the job's deterministic `window_key`.
pub fn window_key(bucket_start: Timestamp) -> String {
    bucket_start.format(WINDOW_KEY_FORMAT).to_string()
}

/// Derive the globally unique idempotency key for a `(user, page, window)`
/// triple.
pub fn idempotency_key(user_id: DbId, page_id: DbId, window_key: &str) -> String {
    sha256_hex(format!("{user_id}:{page_id}:{window_key}").as_bytes())
}

/// Truncate a timestamp to the start of its epoch-aligned bucket.
fn truncate_to_window(at: Timestamp, window: Duration) -> Timestamp {
    let window_secs = window.num_seconds();
    let bucket_secs = at.timestamp() - at.timestamp().rem_euclid(window_secs);
    Utc.timestamp_opt(bucket_secs, 0).single().unwrap_or(at)
}

/// Drop sub-microsecond precision to match `timestamptz` resolution.
fn truncate_to_micros(at: Timestamp) -> Timestamp {
    DateTime::from_timestamp_micros(at.timestamp_micros()).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn hourly_events_in_same_hour_share_a_bucket() {
        let a = bounds(PushFrequency::Hourly, at(10, 0, 5));
        let b = bounds(PushFrequency::Hourly, at(10, 42, 10));

        assert_eq!(a.bucket_start, at(10, 0, 0));
        assert_eq!(a, b);
        assert_eq!(a.send_after, at(11, 0, 0));
        assert_eq!(window_key(a.bucket_start), window_key(b.bucket_start));
    }

    #[test]
    fn hourly_events_in_different_hours_get_distinct_buckets() {
        let a = bounds(PushFrequency::Hourly, at(10, 59, 59));
        let b = bounds(PushFrequency::Hourly, at(11, 0, 0));

        assert_eq!(a.bucket_start, at(10, 0, 0));
        assert_eq!(b.bucket_start, at(11, 0, 0));
        assert_ne!(window_key(a.bucket_start), window_key(b.bucket_start));
    }

    #[test]
    fn daily_bucket_is_epoch_aligned() {
        let w = bounds(PushFrequency::Daily, at(15, 30, 0));
        assert_eq!(
            w.bucket_start,
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            w.send_after,
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn immediate_bucket_is_the_event_instant() {
        let occurred = at(10, 0, 5);
        let w = bounds(PushFrequency::Immediate, occurred);
        assert_eq!(w.bucket_start, occurred);
        assert_eq!(w.send_after, occurred);
    }

    #[test]
    fn immediate_events_at_distinct_instants_never_collide() {
        let a = bounds(PushFrequency::Immediate, at(10, 0, 5));
        let b = bounds(
            PushFrequency::Immediate,
            at(10, 0, 5) + Duration::microseconds(1),
        );
        assert_ne!(window_key(a.bucket_start), window_key(b.bucket_start));
    }

    #[test]
    fn advance_moves_to_the_next_bucket() {
        let current = bounds(PushFrequency::EveryThreeHours, at(10, 15, 0));
        let next = advance(PushFrequency::EveryThreeHours, current);

        assert_eq!(next.bucket_start, current.bucket_start + Duration::hours(3));
        assert_eq!(next.send_after, next.bucket_start + Duration::hours(3));
    }

    #[test]
    fn advance_for_immediate_steps_one_microsecond() {
        let current = bounds(PushFrequency::Immediate, at(10, 0, 5));
        let next = advance(PushFrequency::Immediate, current);

        assert_eq!(
            next.bucket_start,
            current.bucket_start + Duration::microseconds(1)
        );
        assert_eq!(next.send_after, next.bucket_start);
    }

    #[test]
    fn window_key_is_deterministic_and_microsecond_precise() {
        let key = window_key(at(10, 0, 0));
        assert_eq!(key, "2025-06-01T10:00:00.000000Z");
    }

    #[test]
    fn idempotency_key_distinguishes_user_page_and_window() {
        let key = window_key(at(10, 0, 0));
        let base = idempotency_key(1, 2, &key);

        assert_eq!(base.len(), 64);
        assert_eq!(base, idempotency_key(1, 2, &key));
        assert_ne!(base, idempotency_key(2, 2, &key));
        assert_ne!(base, idempotency_key(1, 3, &key));
        assert_ne!(base, idempotency_key(1, 2, &window_key(at(11, 0, 0))));
    }
}
