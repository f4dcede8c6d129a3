//! Model gateway — stateless relay between chat clients and the LLM backends.
//!
//! Each request is independent: pick a backend from the selector, check it is
//! configured, forward, and hand back either normalized text or the raw
//! provider payload. Nothing is retried or stored here.

pub mod routes;

pub use routes::{GatewayState, gateway_routes};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::llm::{ConversationMessage, ModelSelector, ProviderReply, Providers};

/// A validated conversation turn ready to forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayRequest {
    /// Prior turns, welcome message excluded.
    pub history: Vec<ConversationMessage>,
    pub message: String,
    pub model: ModelSelector,
}

/// Body as it arrives on the wire. Everything is optional so that a missing
/// `message` is a 400 rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyBody {
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl TryFrom<ProxyBody> for GatewayRequest {
    type Error = GatewayError;

    fn try_from(body: ProxyBody) -> Result<Self, Self::Error> {
        let message = body.message.filter(|m| !m.is_empty()).ok_or_else(|| {
            GatewayError::BadRequest("Message content is required.".to_string())
        })?;

        Ok(Self {
            history: body.history,
            message,
            model: ModelSelector::from_wire(body.model.as_deref()),
        })
    }
}

/// Successful gateway answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GatewayResponse {
    /// Normalized `{ "text": ... }`.
    Text { text: String },
    /// Provider payload passed through as-is.
    Raw(serde_json::Value),
}

impl From<ProviderReply> for GatewayResponse {
    fn from(reply: ProviderReply) -> Self {
        match reply {
            ProviderReply::Text(text) => Self::Text { text },
            ProviderReply::Raw(value) => Self::Raw(value),
        }
    }
}

/// Dispatches conversation turns to the configured providers.
#[derive(Clone)]
pub struct Gateway {
    providers: Providers,
}

impl Gateway {
    pub fn new(providers: Providers) -> Self {
        Self { providers }
    }

    /// Forward one turn to the selected backend.
    pub async fn handle(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let Some(provider) = self.providers.get(request.model) else {
            warn!(model = %request.model, "Backend not configured, reporting service offline");
            return Err(GatewayError::ServiceUnavailable {
                provider: request.model.display_name().to_string(),
            });
        };

        info!(
            model = %request.model,
            upstream_model = provider.model_name(),
            history_len = request.history.len(),
            "Forwarding chat turn"
        );

        let reply = provider.send(&request.history, &request.message).await?;
        Ok(reply.into())
    }
}
