//! Push subscription entity models and DTOs.

use quillcast_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `push_subscriptions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushSubscription {
    pub id: DbId,
    pub user_id: DbId,
    pub workspace_id: DbId,
    /// Push service endpoint URL; unique, 1:1 with a browser/device.
    pub endpoint: String,
    /// Client ECDH public key, opaque to this core.
    pub p256dh: String,
    /// Client auth secret, opaque to this core.
    pub auth: String,
    pub user_agent: Option<String>,
    pub last_seen_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PushSubscription {
    /// Whether the endpoint is still accepting deliveries.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// DTO for registering (or re-registering) a push endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSubscription {
    pub user_id: DbId,
    pub workspace_id: DbId,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
}
