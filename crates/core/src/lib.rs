//! Shared types and pure logic for the Quillcast push notification core.
//!
//! This crate has no database or network dependencies. It provides:
//!
//! - [`types`] — workspace-wide id and timestamp aliases.
//! - [`clock`] — injectable clock abstraction so window math and due-ness
//!   checks are deterministic under test.
//! - [`frequency`] — the closed set of per-user push frequency preferences.
//! - [`window`] — coalescing-window bucket math and key derivation.
//! - [`hashing`] — SHA-256 hex digest used for idempotency keys.
//! - [`error`] — the shared [`CoreError`](error::CoreError) type.

pub mod clock;
pub mod error;
pub mod frequency;
pub mod hashing;
pub mod types;
pub mod window;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CoreError;
pub use frequency::PushFrequency;
