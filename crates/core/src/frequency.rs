//! Per-user push notification frequency preference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How often a user wants coalesced push notifications.
///
/// Stored in the database as the wire strings `immediate`, `1h`, `3h`,
/// `6h`, `24h`. `Immediate` disables coalescing entirely: every event
/// produces its own notification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PushFrequency {
    Immediate,
    Hourly,
    EveryThreeHours,
    EverySixHours,
    Daily,
}

impl PushFrequency {
    /// The database/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Hourly => "1h",
            Self::EveryThreeHours => "3h",
            Self::EverySixHours => "6h",
            Self::Daily => "24h",
        }
    }

    /// Coalescing window size, or `None` for `Immediate` (window size zero).
    pub fn window(self) -> Option<chrono::Duration> {
        let hours = match self {
            Self::Immediate => return None,
            Self::Hourly => 1,
            Self::EveryThreeHours => 3,
            Self::EverySixHours => 6,
            Self::Daily => 24,
        };
        Some(chrono::Duration::hours(hours))
    }
}

impl Default for PushFrequency {
    fn default() -> Self {
        Self::Immediate
    }
}

impl fmt::Display for PushFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PushFrequency {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(Self::Immediate),
            "1h" => Ok(Self::Hourly),
            "3h" => Ok(Self::EveryThreeHours),
            "6h" => Ok(Self::EverySixHours),
            "24h" => Ok(Self::Daily),
            other => Err(crate::error::CoreError::Validation(format!(
                "Unknown push frequency: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for PushFrequency {
    type Error = crate::error::CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PushFrequency> for String {
    fn from(value: PushFrequency) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_strings() {
        for freq in [
            PushFrequency::Immediate,
            PushFrequency::Hourly,
            PushFrequency::EveryThreeHours,
            PushFrequency::EverySixHours,
            PushFrequency::Daily,
        ] {
            assert_eq!(freq.as_str().parse::<PushFrequency>().unwrap(), freq);
        }
    }

    #[test]
    fn rejects_unknown_values() {
        assert!("2h".parse::<PushFrequency>().is_err());
        assert!("".parse::<PushFrequency>().is_err());
    }

    #[test]
    fn immediate_has_no_window() {
        assert!(PushFrequency::Immediate.window().is_none());
        assert_eq!(
            PushFrequency::Daily.window(),
            Some(chrono::Duration::hours(24))
        );
    }
}
