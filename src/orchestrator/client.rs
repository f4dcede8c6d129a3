//! Gateway client — the one place that knows both success shapes.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ChatError;
use crate::gateway::GatewayRequest;

/// Anything that can carry a conversation turn to the gateway.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn post_chat(&self, request: &GatewayRequest) -> Result<GatewayReply, ChatError>;
}

/// A successful gateway body.
///
/// Grok replies are normalized by the gateway; Gemini replies arrive as the
/// raw provider payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GatewayReply {
    Normalized { text: String },
    Candidates { candidates: Vec<Candidate> },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GatewayReply {
    /// Reduce either shape to the reply text.
    ///
    /// A Gemini payload without candidates (or whose first candidate has no
    /// text) is an upstream failure, not an empty reply.
    pub fn into_text(self) -> Result<String, ChatError> {
        match self {
            Self::Normalized { text } => Ok(text),
            Self::Candidates { candidates } => {
                let first = candidates
                    .into_iter()
                    .next()
                    .ok_or_else(|| ChatError::EmptyUpstream("no candidates".to_string()))?;
                let parts = first.content.map(|c| c.parts).unwrap_or_default();
                let texts: Vec<String> = parts.into_iter().filter_map(|p| p.text).collect();
                if texts.is_empty() {
                    return Err(ChatError::EmptyUpstream(
                        "first candidate has no text parts".to_string(),
                    ));
                }
                Ok(texts.concat())
            }
        }
    }
}

/// Talks to a gateway over HTTP.
pub struct HttpGatewayClient {
    client: reqwest::Client,
    url: String,
}

impl HttpGatewayClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn post_chat(&self, request: &GatewayRequest) -> Result<GatewayReply, ChatError> {
        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .or(status.canonical_reason())
                .unwrap_or("Gateway error")
                .to_string();
            return Err(ChatError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_value(body).map_err(|e| ChatError::InvalidResponse(e.to_string()))
    }
}
