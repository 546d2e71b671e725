//! Inbound domain event envelope.

use quillcast_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// A domain event affecting one user's view of one page.
///
/// Raised by the application layer (comment created, mention, page
/// update) and fed to the [`Coalescer`](crate::Coalescer). Constructed
/// via [`PageEvent::new`] and enriched with the builder methods
/// [`with_fragment`](PageEvent::with_fragment) and
/// [`occurred_at`](PageEvent::occurred_at).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEvent {
    /// The user to notify.
    pub user_id: DbId,

    /// Workspace the page belongs to.
    pub workspace_id: DbId,

    /// The page the event concerns.
    pub page_id: DbId,

    /// Free-form JSON fragment summarizing the event, used to render the
    /// eventual notification text.
    pub fragment: serde_json::Value,

    /// When the event occurred (UTC). `None` means "when the coalescer
    /// sees it", resolved through the coalescer's injected clock.
    pub occurred_at: Option<Timestamp>,
}

impl PageEvent {
    /// Create a new event with an empty fragment.
    pub fn new(user_id: DbId, workspace_id: DbId, page_id: DbId) -> Self {
        Self {
            user_id,
            workspace_id,
            page_id,
            fragment: serde_json::Value::Object(Default::default()),
            occurred_at: None,
        }
    }

    /// Set the JSON fragment for the event.
    pub fn with_fragment(mut self, fragment: serde_json::Value) -> Self {
        self.fragment = fragment;
        self
    }

    /// Pin the event to an explicit occurrence instant.
    pub fn occurred_at(mut self, at: Timestamp) -> Self {
        self.occurred_at = Some(at);
        self
    }
}
