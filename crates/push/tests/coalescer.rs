//! Integration tests for event coalescing: idempotent windowing, the
//! immediate preference, and the window-advance rule.

use chrono::{Duration, TimeZone, Utc};
use quillcast_core::clock::FixedClock;
use quillcast_core::types::Timestamp;
use quillcast_core::PushFrequency;
use quillcast_db::models::push_settings::PushPrefs;
use quillcast_db::models::status::JobStatus;
use quillcast_db::repositories::NotificationJobRepo;
use quillcast_push::{Coalescer, PageEvent};
use sqlx::PgPool;

fn at(h: u32, m: u32, s: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap()
}

fn hourly() -> PushPrefs {
    PushPrefs {
        enabled: true,
        frequency: PushFrequency::Hourly,
    }
}

fn immediate() -> PushPrefs {
    PushPrefs {
        enabled: true,
        frequency: PushFrequency::Immediate,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn hourly_events_coalesce_into_one_job(pool: PgPool) {
    let coalescer = Coalescer::with_clock(pool.clone(), FixedClock(at(10, 0, 0)));

    let first = PageEvent::new(1, 1, 7)
        .with_fragment(serde_json::json!({"kind": "comment"}))
        .occurred_at(at(10, 0, 5));
    let second = PageEvent::new(1, 1, 7)
        .with_fragment(serde_json::json!({"kind": "mention"}))
        .occurred_at(at(10, 42, 10));

    let id_a = coalescer.record_event(&first, &hourly()).await.unwrap().unwrap();
    let id_b = coalescer.record_event(&second, &hourly()).await.unwrap().unwrap();
    assert_eq!(id_a, id_b);

    let jobs = NotificationJobRepo::list_for_page(&pool, 1, 7).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].events_count, 2);
    assert_eq!(jobs[0].window_key, "2025-06-01T10:00:00.000000Z");
    assert_eq!(jobs[0].send_after, at(11, 0, 0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn immediate_preference_never_coalesces(pool: PgPool) {
    let coalescer = Coalescer::with_clock(pool.clone(), FixedClock(at(10, 0, 0)));

    let first = PageEvent::new(1, 1, 7).occurred_at(at(10, 0, 5));
    let second = PageEvent::new(1, 1, 7).occurred_at(at(10, 0, 6));

    let id_a = coalescer
        .record_event(&first, &immediate())
        .await
        .unwrap()
        .unwrap();
    let id_b = coalescer
        .record_event(&second, &immediate())
        .await
        .unwrap()
        .unwrap();
    assert_ne!(id_a, id_b);

    let jobs = NotificationJobRepo::list_for_page(&pool, 1, 7).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].events_count, 1);
    assert_eq!(jobs[0].send_after, at(10, 0, 5));
    assert_eq!(jobs[1].send_after, at(10, 0, 6));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn event_after_claim_starts_the_next_window(pool: PgPool) {
    let coalescer = Coalescer::with_clock(pool.clone(), FixedClock(at(10, 0, 0)));

    let event = PageEvent::new(1, 1, 7).occurred_at(at(10, 0, 5));
    coalescer.record_event(&event, &hourly()).await.unwrap().unwrap();

    // The scheduler claims the 10:00 window's job.
    let claimed = NotificationJobRepo::claim_due_batch(&pool, at(11, 0, 1), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    // A straggler for the same window lands in the 11:00 bucket instead.
    let straggler = PageEvent::new(1, 1, 7).occurred_at(at(10, 59, 59));
    coalescer
        .record_event(&straggler, &hourly())
        .await
        .unwrap()
        .unwrap();

    let jobs = NotificationJobRepo::list_for_page(&pool, 1, 7).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_ne!(jobs[0].window_key, jobs[1].window_key);
    assert_eq!(jobs[1].window_key, "2025-06-01T11:00:00.000000Z");
    assert_eq!(jobs[1].status_id, JobStatus::Pending.id());

    // No event lost: both are accounted for across the two jobs.
    let total = NotificationJobRepo::sum_events_for_page(&pool, 1, 7)
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn disabled_push_short_circuits(pool: PgPool) {
    let coalescer = Coalescer::with_clock(pool.clone(), FixedClock(at(10, 0, 0)));
    let prefs = PushPrefs {
        enabled: false,
        frequency: PushFrequency::Hourly,
    };

    let event = PageEvent::new(1, 1, 7).occurred_at(at(10, 0, 5));
    let result = coalescer.record_event(&event, &prefs).await.unwrap();
    assert!(result.is_none());

    let jobs = NotificationJobRepo::list_for_page(&pool, 1, 7).await.unwrap();
    assert!(jobs.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unset_occurrence_instant_comes_from_the_clock(pool: PgPool) {
    let coalescer = Coalescer::with_clock(pool.clone(), FixedClock(at(10, 42, 10)));

    let event = PageEvent::new(1, 1, 7);
    coalescer.record_event(&event, &hourly()).await.unwrap().unwrap();

    let jobs = NotificationJobRepo::list_for_page(&pool, 1, 7).await.unwrap();
    assert_eq!(jobs[0].window_key, "2025-06-01T10:00:00.000000Z");
    assert_eq!(jobs[0].send_after, at(11, 0, 0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_ingestion_folds_into_one_row(pool: PgPool) {
    let coalescer = Coalescer::with_clock(pool.clone(), FixedClock(at(10, 0, 0)));

    let make_event = |n: i64| {
        PageEvent::new(1, 1, 7)
            .with_fragment(serde_json::json!({"n": n}))
            .occurred_at(at(10, 0, 5) + Duration::seconds(n))
    };

    let events = [make_event(0), make_event(1), make_event(2), make_event(3)];
    let prefs = hourly();
    let (a, b, c, d) = tokio::join!(
        coalescer.record_event(&events[0], &prefs),
        coalescer.record_event(&events[1], &prefs),
        coalescer.record_event(&events[2], &prefs),
        coalescer.record_event(&events[3], &prefs),
    );
    for result in [a, b, c, d] {
        result.unwrap().unwrap();
    }

    let jobs = NotificationJobRepo::list_for_page(&pool, 1, 7).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].events_count, 4);
}
