//! Repository for the `user_push_settings` table.

use quillcast_core::types::DbId;
use sqlx::PgPool;

use crate::models::push_settings::{PushPrefs, UpdatePushSettings, UserPushSettings};

/// Column list for `user_push_settings` queries.
const COLUMNS: &str = "id, user_id, push_enabled, push_frequency, created_at, updated_at";

/// Provides access to per-user push configuration.
pub struct PushSettingsRepo;

impl PushSettingsRepo {
    /// Get the raw settings row for a user, if one exists.
    pub async fn get(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<UserPushSettings>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_push_settings WHERE user_id = $1");
        sqlx::query_as::<_, UserPushSettings>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Resolve a user's effective push preferences.
    ///
    /// A missing row yields the defaults (enabled, immediate).
    pub async fn prefs_for_user(pool: &PgPool, user_id: DbId) -> Result<PushPrefs, sqlx::Error> {
        let settings = Self::get(pool, user_id).await?;
        Ok(settings
            .as_ref()
            .map(PushPrefs::from)
            .unwrap_or_default())
    }

    /// Insert or update a user's push settings.
    ///
    /// Uses `COALESCE` so only the fields that are `Some` in the input are
    /// overwritten.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        input: &UpdatePushSettings,
    ) -> Result<UserPushSettings, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_push_settings (user_id, push_enabled, push_frequency) \
             VALUES ($1, COALESCE($2, true), COALESCE($3, 'immediate')) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 push_enabled = COALESCE($2, user_push_settings.push_enabled), \
                 push_frequency = COALESCE($3, user_push_settings.push_frequency), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserPushSettings>(&query)
            .bind(user_id)
            .bind(input.push_enabled)
            .bind(input.push_frequency.map(|f| f.as_str()))
            .fetch_one(pool)
            .await
    }
}
