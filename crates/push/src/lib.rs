//! Quillcast push notification coalescing and delivery.
//!
//! This crate turns a stream of discrete page events into a bounded number
//! of deduplicated, time-windowed Web Push notifications per user:
//!
//! - [`PageEvent`] — the inbound domain event envelope.
//! - [`Coalescer`] — folds events into windowed notification jobs on the
//!   ingestion path (never blocks on delivery).
//! - [`Scheduler`] — background poll loop that claims due jobs and drives
//!   delivery, including failure-driven subscription revocation.
//! - [`PushSender`] — the injected delivery capability, with the bundled
//!   [`WebPushSender`] HTTP implementation.
//! - [`retention`] — periodic purge of old terminal jobs.

pub mod coalescer;
pub mod dispatcher;
pub mod event;
pub mod retention;
pub mod sender;

pub use coalescer::{CoalesceError, Coalescer};
pub use dispatcher::{Scheduler, SchedulerConfig};
pub use event::PageEvent;
pub use sender::{PushSender, SendOutcome, WebPushSender};
