//! Notification job status enum mapping to the SMALLINT `status_id` column.
//!
//! The discriminants match the values documented in the
//! `notification_jobs` migration. No magic numbers in queries — every
//! status literal goes through [`JobStatus`].

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Lifecycle status of a notification job.
///
/// Transitions: `Pending --claim--> Sending --dispatch--> Sent | Failed`,
/// plus `Sending --all-transient--> Pending` with a deferred `send_after`
/// (bounded by the dispatcher's attempt limit). `Sent` and `Failed` are
/// terminal.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending = 1,
    Sending = 2,
    Sent = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

/// Terminal statuses: sent, failed.
pub const TERMINAL_STATUSES: [StatusId; 2] =
    [JobStatus::Sent as StatusId, JobStatus::Failed as StatusId];
