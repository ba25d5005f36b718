use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;

/// External text-generation capability.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Complete `prompt`. Any failure is reported as a `ProviderError`.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ChatProviderConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// HTTP-level timeout; the reasoning generator applies its own as well
    pub timeout: Duration,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Text provider backed by a `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionsProvider {
    http: Client,
    config: ChatProviderConfig,
}

impl ChatCompletionsProvider {
    pub fn new(config: ChatProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ChatCompletionsProvider { http, config })
    }
}

#[async_trait]
impl TextProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            temperature: 0.2,
            max_tokens: self.config.max_tokens,
        };
        debug!("Requesting reasoning from {} ({} prompt chars)", url, prompt.len());

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Quota(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        extract_completion(parsed)
    }
}

fn extract_completion(resp: ChatResponse) -> Result<String, ProviderError> {
    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ProviderError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_trimmed() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  BUF wins on rating.\n"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_completion(parsed).unwrap(), "BUF wins on rating.");
    }

    #[test]
    fn empty_or_missing_choices_is_an_error() {
        let none: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_completion(none), Err(ProviderError::EmptyResponse)));

        let missing: ChatResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(extract_completion(missing), Err(ProviderError::EmptyResponse)));

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#)
                .unwrap();
        assert!(matches!(extract_completion(blank), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn request_body_shape() {
        let req = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: 0.2,
            max_tokens: 200,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "m");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["max_tokens"], 200);
    }
}
