pub mod notification_job_repo;
pub mod push_settings_repo;
pub mod push_subscription_repo;

pub use notification_job_repo::NotificationJobRepo;
pub use push_settings_repo::PushSettingsRepo;
pub use push_subscription_repo::PushSubscriptionRepo;
