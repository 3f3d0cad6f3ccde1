//! Chat-completion API client.
//!
//! Any failure (missing key, transport error, non-2xx status, empty
//! choice) is logged and replaced by the assistant's canned reply.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompts::{fallback_reply, system_prompt};
use super::types::{AssistantKind, Reply, ReplySource, Role, Turn};
use crate::storage::config::AssistantSettings;

/// Sampling temperature sent with every request.
const TEMPERATURE: f32 = 0.7;

/// Completion length cap.
const MAX_TOKENS: u32 = 1000;

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    history_turns: usize,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Turn>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    /// Build a client from the assistant settings.
    pub fn from_settings(settings: &AssistantSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            history_turns: settings.history_turns,
        })
    }

    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Request payload messages: the system prompt plus the trailing turns.
    pub fn build_messages(&self, kind: AssistantKind, history: &[Turn]) -> Vec<Turn> {
        let start = history.len().saturating_sub(self.history_turns);
        let mut messages = Vec::with_capacity(history.len() - start + 1);
        messages.push(Turn::new(Role::System, system_prompt(kind)));
        messages.extend(
            history[start..]
                .iter()
                .filter(|turn| turn.role != Role::System)
                .cloned(),
        );
        messages
    }

    /// Complete a conversation. Never fails.
    pub async fn complete(&self, kind: AssistantKind, history: &[Turn]) -> Reply {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(assistant = kind.as_str(), "LLM API key not configured, using fallback");
            return fallback(kind);
        };

        match self.request(api_key, kind, history).await {
            Ok(content) => Reply {
                content,
                source: ReplySource::Model,
            },
            Err(reason) => {
                tracing::warn!(assistant = kind.as_str(), "LLM request failed: {}", reason);
                fallback(kind)
            }
        }
    }

    async fn request(
        &self,
        api_key: &str,
        kind: AssistantKind,
        history: &[Turn],
    ) -> Result<String, String> {
        let body = CompletionRequest {
            model: &self.model,
            messages: self.build_messages(kind, history),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("API returned status {}", status));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| "response had no content".to_string())
    }
}

fn fallback(kind: AssistantKind) -> Reply {
    Reply {
        content: fallback_reply(kind).to_string(),
        source: ReplySource::Fallback,
    }
}
