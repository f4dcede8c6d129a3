//! Grok backend: OpenAI-compatible chat completions.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::prompt::SYSTEM_INSTRUCTION;
use super::{ConversationMessage, ModelProvider, ProviderReply, Role};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Shown when Grok answers 2xx but without any choice.
pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, I couldn't get a response from Grok.";

pub struct GrokProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<ChatCompletionMessage<'a>>,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl GrokProvider {
    pub fn new(client: reqwest::Client, api_key: SecretString, config: &GatewayConfig) -> Self {
        Self {
            client,
            api_key,
            model: config.grok_model.clone(),
            endpoint: format!("{}/v1/chat/completions", config.grok_base_url),
        }
    }

    fn build_request<'a>(
        &'a self,
        history: &'a [ConversationMessage],
        message: &'a str,
    ) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatCompletionMessage {
            role: "system",
            content: SYSTEM_INSTRUCTION,
        });
        messages.extend(history.iter().map(|m| ChatCompletionMessage {
            role: match m.role {
                Role::User => "user",
                Role::Model => "assistant",
            },
            content: &m.content,
        }));
        messages.push(ChatCompletionMessage {
            role: "user",
            content: message,
        });

        ChatCompletionRequest {
            messages,
            model: &self.model,
        }
    }
}

#[async_trait]
impl ModelProvider for GrokProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        history: &[ConversationMessage],
        message: &str,
    ) -> Result<ProviderReply, GatewayError> {
        let body = self.build_request(history, message);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Internal(format!("Grok request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body: serde_json::Value = response.json().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %error_body, "Grok API error");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&error_body, "Grok API error"),
            });
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Internal(format!("Invalid Grok response: {e}")))?;

        let text = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string());

        Ok(ProviderReply::Text(text))
    }
}

/// Pull `error.message` out of a provider error body.
pub(crate) fn upstream_message(body: &serde_json::Value, fallback: &str) -> String {
    body.pointer("/error/message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
