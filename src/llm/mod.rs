//! LLM integration for the gateway.
//!
//! Supports:
//! - **Gemini**: `generateContent` REST API, raw payload passed through
//! - **Grok**: OpenAI-compatible chat completions, normalized to `{ text }`
//!
//! Both backends sit behind the `ModelProvider` trait so the gateway never
//! branches on provider details beyond picking one.

pub mod gemini;
pub mod grok;
pub mod prompt;

pub use gemini::GeminiProvider;
pub use grok::GrokProvider;
pub use prompt::SYSTEM_INSTRUCTION;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One entry of the conversation history, as exchanged with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// Which backend answers the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSelector {
    #[default]
    Gemini,
    Grok,
}

impl ModelSelector {
    /// Interpret the wire value. Anything but `"grok"` selects Gemini.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("grok") => Self::Grok,
            _ => Self::Gemini,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Grok => "grok",
        }
    }

    /// Provider name as shown in operator-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::Grok => "Grok",
        }
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "grok" => Ok(Self::Grok),
            other => Err(format!("unknown model '{other}' (expected gemini or grok)")),
        }
    }
}

/// What a provider hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderReply {
    /// Already normalized assistant text.
    Text(String),
    /// Provider payload forwarded untouched.
    Raw(serde_json::Value),
}

/// A backend that can answer one conversation turn.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Model identifier sent upstream.
    fn model_name(&self) -> &str;

    /// Send `message` after replaying `history` under the system instruction.
    async fn send(
        &self,
        history: &[ConversationMessage],
        message: &str,
    ) -> Result<ProviderReply, GatewayError>;
}

/// The providers that have credentials configured.
#[derive(Clone, Default)]
pub struct Providers {
    pub gemini: Option<Arc<dyn ModelProvider>>,
    pub grok: Option<Arc<dyn ModelProvider>>,
}

impl Providers {
    /// Build providers for every backend whose API key is present.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let client = reqwest::Client::new();

        let gemini = config.gemini_api_key.clone().map(|key| {
            tracing::info!("Gemini backend enabled (model: {})", config.gemini_model);
            Arc::new(GeminiProvider::new(client.clone(), key, config)) as Arc<dyn ModelProvider>
        });
        let grok = config.grok_api_key.clone().map(|key| {
            tracing::info!("Grok backend enabled (model: {})", config.grok_model);
            Arc::new(GrokProvider::new(client.clone(), key, config)) as Arc<dyn ModelProvider>
        });

        if gemini.is_none() {
            tracing::warn!("GEMINI_API_KEY not set, Gemini requests will report service offline");
        }
        if grok.is_none() {
            tracing::warn!("GROK_API_KEY not set, Grok requests will report service offline");
        }

        Self { gemini, grok }
    }

    /// Look up the provider for a selector.
    pub fn get(&self, model: ModelSelector) -> Option<&Arc<dyn ModelProvider>> {
        match model {
            ModelSelector::Gemini => self.gemini.as_ref(),
            ModelSelector::Grok => self.grok.as_ref(),
        }
    }
}
