//! Boundary to the external AI content generator.
//!
//! Every failure is classified here, once, with an explicit `retryable`
//! flag. Callers never inspect error text to decide whether to retry.

pub mod extract;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::models::Content;

pub use extract::extract_content;
pub use http::HttpGenerator;

/// What the generator is asked to write about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInput {
    pub prompt: String,
    pub tags: Vec<String>,
}

/// Failure category reported by a generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorErrorKind {
    /// The call did not finish within the timeout
    Timeout,
    /// Upstream is overloaded (HTTP 503/529)
    Overloaded,
    /// Upstream rate limit hit (HTTP 429)
    RateLimited,
    /// Any other non-success HTTP status
    Http,
    /// Connection or protocol failure
    Transport,
    /// The response could not be turned into content
    Malformed,
}

impl GeneratorErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            GeneratorErrorKind::Timeout
                | GeneratorErrorKind::Overloaded
                | GeneratorErrorKind::RateLimited
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct GeneratorError {
    pub kind: GeneratorErrorKind,
    pub retryable: bool,
    pub message: String,
}

impl GeneratorError {
    pub fn new(kind: GeneratorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            GeneratorErrorKind::Timeout,
            format!("generator did not respond within {}s", after.as_secs_f32()),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GeneratorErrorKind::Malformed, message)
    }

    /// Classifies an upstream HTTP status
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            429 => GeneratorErrorKind::RateLimited,
            503 | 529 => GeneratorErrorKind::Overloaded,
            _ => GeneratorErrorKind::Http,
        };
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate(body, 300))
        };
        Self::new(kind, message)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// A source of generated educational content
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, input: &GenerationInput) -> Result<Content, GeneratorError>;
}

/// Calls the generator, converting an overrun of `limit` into a retryable
/// timeout error regardless of how the generator itself handles time.
pub async fn generate_with_timeout(
    generator: &dyn ContentGenerator,
    input: &GenerationInput,
    limit: Duration,
) -> Result<Content, GeneratorError> {
    match tokio::time::timeout(limit, generator.generate(input)).await {
        Ok(result) => result,
        Err(_) => Err(GeneratorError::timeout(limit)),
    }
}
