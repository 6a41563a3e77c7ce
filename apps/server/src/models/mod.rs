pub mod event;
pub mod job;
pub mod usage;

pub use event::{GenerateRequested, JobEvent};
pub use job::{Content, GenerationJob, JobStatus, JobView, Section, SubmitRequest};
pub use usage::{Usage, UsageCounter, UsageSummary};
