//! HTTP client for a Gemini-style `generateContent` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    extract_content, ContentGenerator, GenerationInput, GeneratorError, GeneratorErrorKind,
};
use crate::config::GeneratorConfig;
use crate::error::{AppError, AppResult};
use crate::models::Content;

/// Content generator backed by the external AI service
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl HttpGenerator {
    /// Creates a generator from configuration
    pub fn new(config: &GeneratorConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Internal("Generator API key is not configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            api_key,
            language: config.language.clone(),
        })
    }

    /// Builds the instruction sent to the model
    pub fn build_prompt(language: &str, input: &GenerationInput) -> String {
        let tags = if input.tags.is_empty() {
            "none".to_string()
        } else {
            input.tags.join(", ")
        };

        format!(
            "Write a short educational article in {language} about: \"{prompt}\".\n\
             Related tags: {tags}.\n\
             Respond with a single JSON object and nothing else, shaped as:\n\
             {{\"title\": string, \"content\": string, \"sections\": [{{\"title\": string, \"content\": string}}]}}\n\
             Use 3 to 5 sections. Do not include markdown code fences.",
            language = language,
            prompt = input.prompt,
            tags = tags,
        )
    }

    fn classify_transport(e: reqwest::Error) -> GeneratorError {
        if e.is_timeout() {
            GeneratorError::new(GeneratorErrorKind::Timeout, "Request timed out")
        } else if e.is_connect() {
            GeneratorError::new(GeneratorErrorKind::Transport, "Connection failed")
        } else {
            GeneratorError::new(
                GeneratorErrorKind::Transport,
                format!("Request failed: {}", e),
            )
        }
    }
}

/// Concatenates the text parts of the first candidate
fn response_text(body: &str) -> Result<String, GeneratorError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GeneratorError::malformed(format!("Unexpected response shape: {}", e)))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GeneratorError::malformed("Response contained no text"));
    }

    Ok(text)
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate(&self, input: &GenerationInput) -> Result<Content, GeneratorError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": Self::build_prompt(&self.language, input) }]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::classify_transport)?;

        if !status.is_success() {
            return Err(GeneratorError::from_status(status.as_u16(), &text));
        }

        extract_content(&response_text(&text)?)
    }
}
