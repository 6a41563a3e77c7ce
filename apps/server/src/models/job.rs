//! Generation job model and its status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Job Status Enum
// =============================================================================

/// Lifecycle state of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted but not yet handed to a worker. The submit flow skips this state.
    Pending,
    Generating,
    Completed,
    Failed,
    Regenerating,
}

impl JobStatus {
    /// Completed and Failed are the only states a poller stops on
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// A worker may currently own the job
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Generating) => true,
            (Pending | Generating | Regenerating, Completed | Failed) => true,
            (Completed | Failed, Regenerating) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Regenerating => "regenerating",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Content
// =============================================================================

/// A titled section of generated content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// Fully formed article content, never partially written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub title: String,
    pub body: String,
    pub sections: Vec<Section>,
}

impl Content {
    /// Content shown while a worker is running for the given status
    pub fn placeholder(status: JobStatus) -> Self {
        let (title, body) = match status {
            JobStatus::Regenerating => (
                "Regenerating...",
                "Your content is being regenerated. This usually takes under a minute.",
            ),
            _ => (
                "Generating...",
                "Your content is being generated. This usually takes under a minute.",
            ),
        };

        Self {
            title: title.to_string(),
            body: body.to_string(),
            sections: Vec::new(),
        }
    }

    /// Content stored on a job the worker could not complete
    pub fn failure(diagnostic: &str) -> Self {
        Self {
            title: "Generation failed".to_string(),
            body: format!(
                "We could not save the generated content. Please try regenerating. Details: {}",
                diagnostic
            ),
            sections: Vec::new(),
        }
    }
}

// =============================================================================
// Generation Job
// =============================================================================

/// A single generation request and its lifecycle record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GenerationJob {
    pub id: Uuid,
    pub user_id: String,
    pub prompt: String,
    pub tags: Vec<String>,
    pub status: JobStatus,
    pub title: String,
    #[sqlx(json)]
    pub content: Content,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Builds a freshly submitted job with placeholder content
    pub fn new_generating(
        user_id: &str,
        prompt: &str,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let content = Content::placeholder(JobStatus::Generating);
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
            tags,
            status: JobStatus::Generating,
            title: content.title.clone(),
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// This job reset to Regenerating with placeholder content
    pub fn regenerating(&self, now: DateTime<Utc>) -> Self {
        let content = Content::placeholder(JobStatus::Regenerating);
        Self {
            status: JobStatus::Regenerating,
            title: content.title.clone(),
            content,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Non-terminal and not touched within `stall_after`
    pub fn is_stalled(&self, now: DateTime<Utc>, stall_after: std::time::Duration) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let stall_after = chrono::Duration::from_std(stall_after).unwrap_or(chrono::Duration::MAX);
        now - self.updated_at > stall_after
    }
}

/// DTO for submitting a new generation request
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub prompt: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Job as returned to a polling client
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: GenerationJob,
    /// True when the job is non-terminal but no worker has touched it for too long
    pub stalled: bool,
}
