pub mod notification_job;
pub mod push_settings;
pub mod push_subscription;
pub mod status;
