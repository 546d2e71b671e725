//! Repository for the `push_subscriptions` table.

use quillcast_core::types::DbId;
use sqlx::PgPool;

use crate::models::push_subscription::{PushSubscription, RegisterSubscription};

/// Column list for `push_subscriptions` queries.
const COLUMNS: &str = "\
    id, user_id, workspace_id, endpoint, p256dh, auth, user_agent, \
    last_seen_at, revoked_at, created_at, updated_at";

/// Provides registration, lookup, and revocation of push endpoints.
pub struct PushSubscriptionRepo;

impl PushSubscriptionRepo {
    /// Register a push endpoint, upserting by `endpoint`.
    ///
    /// Browsers may reuse or reissue the same endpoint URL across login
    /// sessions, so re-registration overwrites the key material and user
    /// binding, refreshes `last_seen_at`, and clears `revoked_at`.
    pub async fn register(
        pool: &PgPool,
        input: &RegisterSubscription,
    ) -> Result<PushSubscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO push_subscriptions \
                 (user_id, workspace_id, endpoint, p256dh, auth, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (endpoint) DO UPDATE SET \
                 user_id = EXCLUDED.user_id, \
                 workspace_id = EXCLUDED.workspace_id, \
                 p256dh = EXCLUDED.p256dh, \
                 auth = EXCLUDED.auth, \
                 user_agent = EXCLUDED.user_agent, \
                 last_seen_at = NOW(), \
                 revoked_at = NULL, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PushSubscription>(&query)
            .bind(input.user_id)
            .bind(input.workspace_id)
            .bind(&input.endpoint)
            .bind(&input.p256dh)
            .bind(&input.auth)
            .bind(&input.user_agent)
            .fetch_one(pool)
            .await
    }

    /// List a user's active (non-revoked) subscriptions for fan-out.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<PushSubscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM push_subscriptions \
             WHERE user_id = $1 AND revoked_at IS NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, PushSubscription>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Find a subscription by its endpoint URL.
    pub async fn find_by_endpoint(
        pool: &PgPool,
        endpoint: &str,
    ) -> Result<Option<PushSubscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM push_subscriptions WHERE endpoint = $1");
        sqlx::query_as::<_, PushSubscription>(&query)
            .bind(endpoint)
            .fetch_optional(pool)
            .await
    }

    /// User-initiated unsubscribe by endpoint.
    ///
    /// Idempotent: revoking an already-revoked endpoint is a no-op that
    /// keeps the original `revoked_at`. Returns `true` only when this call
    /// performed the revocation.
    pub async fn revoke_by_endpoint(
        pool: &PgPool,
        endpoint: &str,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE push_subscriptions \
             SET revoked_at = NOW(), updated_at = NOW() \
             WHERE endpoint = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(endpoint)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// User-initiated unsubscribe by subscription ID.
    pub async fn revoke_by_id(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE push_subscriptions \
             SET revoked_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revocation-handler path: mark an endpoint dead after the push
    /// service confirmed it is gone.
    ///
    /// Unscoped by user because the report comes from the delivery side.
    /// Idempotent; the row is kept for diagnostics, never deleted.
    pub async fn revoke_endpoint(pool: &PgPool, endpoint: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE push_subscriptions \
             SET revoked_at = NOW(), updated_at = NOW() \
             WHERE endpoint = $1 AND revoked_at IS NULL",
        )
        .bind(endpoint)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
