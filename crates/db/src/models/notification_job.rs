//! Notification job entity models and DTOs.

use quillcast_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `notification_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationJob {
    pub id: DbId,
    pub user_id: DbId,
    pub workspace_id: DbId,
    pub page_id: DbId,
    pub window_key: String,
    pub idempotency_key: String,
    pub status_id: StatusId,
    pub send_after: Timestamp,
    pub events_count: i32,
    pub payload: serde_json::Value,
    pub delivery_attempts: i32,
    pub last_error: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NotificationJob {
    /// Decode the JSONB payload column into its typed shape.
    pub fn decoded_payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// The JSONB shape of `notification_jobs.payload`.
///
/// `latest` is the most recent event fragment folded into the window;
/// `summary` is a bounded list (oldest dropped first) of every folded
/// fragment, used to render the eventual notification text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub latest: serde_json::Value,
    pub summary: Vec<serde_json::Value>,
}

/// Parameters for the coalescer's atomic upsert.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: DbId,
    pub workspace_id: DbId,
    pub page_id: DbId,
    pub window_key: String,
    pub idempotency_key: String,
    pub send_after: Timestamp,
    /// The raw event fragment; becomes both `latest` and the first
    /// `summary` entry on insert.
    pub fragment: serde_json::Value,
}
