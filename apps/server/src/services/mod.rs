pub mod fallback;
pub mod jobs;
pub mod notification;
pub mod quota;
pub mod retry;

pub use jobs::{parse_submission, validate_submission, Accepted, JobService};
pub use notification::{create_publisher, BroadcastPublisher, EventPublisher, WebhookPublisher};
pub use quota::QuotaTracker;
pub use retry::RetryPolicy;
