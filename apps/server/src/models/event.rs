//! Internal pipeline events.
//!
//! Events carry the `event` discriminator on the wire, e.g.
//! `{"event": "content.generate", "job_id": "...", ...}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Content;

/// Payload of the job-start event consumed by the generation worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequested {
    pub job_id: Uuid,
    pub user_id: String,
    pub prompt: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum JobEvent {
    #[serde(rename = "content.generate")]
    Generate(GenerateRequested),

    #[serde(rename = "content.generate.completed")]
    Completed {
        job_id: Uuid,
        user_id: String,
        content: Content,
    },

    #[serde(rename = "content.generate.failed")]
    Failed {
        job_id: Uuid,
        user_id: String,
        error: String,
    },
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Generate(_) => "content.generate",
            JobEvent::Completed { .. } => "content.generate.completed",
            JobEvent::Failed { .. } => "content.generate.failed",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Generate(req) => req.job_id,
            JobEvent::Completed { job_id, .. } | JobEvent::Failed { job_id, .. } => *job_id,
        }
    }
}
