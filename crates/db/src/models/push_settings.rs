//! Per-user push configuration models.

use quillcast_core::types::{DbId, Timestamp};
use quillcast_core::PushFrequency;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `user_push_settings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserPushSettings {
    pub id: DbId,
    pub user_id: DbId,
    pub push_enabled: bool,
    pub push_frequency: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserPushSettings {
    /// Parse the stored frequency string into the closed enum.
    ///
    /// The column carries a CHECK constraint, so a parse failure can only
    /// come from out-of-band schema drift; fall back to `Immediate`.
    pub fn frequency(&self) -> PushFrequency {
        self.push_frequency.parse().unwrap_or_default()
    }
}

/// Resolved push preferences for one user, with defaults applied when no
/// settings row exists (enabled, immediate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushPrefs {
    pub enabled: bool,
    pub frequency: PushFrequency,
}

impl Default for PushPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: PushFrequency::Immediate,
        }
    }
}

impl From<&UserPushSettings> for PushPrefs {
    fn from(settings: &UserPushSettings) -> Self {
        Self {
            enabled: settings.push_enabled,
            frequency: settings.frequency(),
        }
    }
}

/// DTO for updating user push settings; `None` fields are left unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePushSettings {
    pub push_enabled: Option<bool>,
    pub push_frequency: Option<PushFrequency>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefs_are_enabled_immediate() {
        let prefs = PushPrefs::default();
        assert!(prefs.enabled);
        assert_eq!(prefs.frequency, PushFrequency::Immediate);
    }
}
