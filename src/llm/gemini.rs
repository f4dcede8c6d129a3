//! Gemini backend: `generateContent` with the history replayed as contents.
//!
//! The provider payload is returned untouched; extracting text from it is the
//! client's job (see `orchestrator::client::GatewayReply`).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::grok::upstream_message;
use super::prompt::SYSTEM_INSTRUCTION;
use super::{ConversationMessage, ModelProvider, ProviderReply, Role};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'static str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, api_key: SecretString, config: &GatewayConfig) -> Self {
        Self {
            client,
            api_key,
            model: config.gemini_model.clone(),
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.gemini_base_url, config.gemini_model
            ),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    fn build_request<'a>(
        &self,
        history: &'a [ConversationMessage],
        message: &'a str,
    ) -> GenerateContentRequest<'a> {
        let mut contents: Vec<Content<'a>> = history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                Content::text(Some(role), &m.content)
            })
            .collect();
        contents.push(Content::text(Some("user"), message));

        GenerateContentRequest {
            system_instruction: Content::text(None, SYSTEM_INSTRUCTION),
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
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
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Internal(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await.unwrap_or_default();

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %payload, "Gemini API error");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&payload, "Gemini API error"),
            });
        }

        if payload.is_null() {
            return Err(GatewayError::Internal(
                "Gemini returned a non-JSON success body".to_string(),
            ));
        }

        Ok(ProviderReply::Raw(payload))
    }
}
