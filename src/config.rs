//! Configuration types, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::ModelSelector;
use crate::llm::prompt::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GROK_BASE_URL: &str = "https://api.x.ai";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_GROK_MODEL: &str = "grok-4-latest";

/// Path the gateway serves the proxy on.
pub const GATEWAY_PATH: &str = "/api/ai-proxy";

/// Server-side gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Gemini credentials. `None` means Gemini requests answer 503.
    pub gemini_api_key: Option<SecretString>,
    /// Grok credentials. `None` means Grok requests answer 503.
    pub grok_api_key: Option<SecretString>,
    /// When set, POSTs whose `Origin` differs are rejected with 401.
    pub allowed_origin: Option<String>,
    pub gemini_model: String,
    pub grok_model: String,
    pub gemini_base_url: String,
    pub grok_base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
            gemini_api_key: None,
            grok_api_key: None,
            allowed_origin: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            grok_model: DEFAULT_GROK_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            grok_base_url: DEFAULT_GROK_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl GatewayConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("LEAD_ASSIST_PORT") {
            Some(raw) => parse_value("LEAD_ASSIST_PORT", &raw)?,
            None => defaults.port,
        };

        // `URL` is what the hosting platform exposes for the site origin.
        let allowed_origin = get("LEAD_ASSIST_ALLOWED_ORIGIN").or_else(|| get("URL"));

        Ok(Self {
            host: get("LEAD_ASSIST_HOST").unwrap_or(defaults.host),
            port,
            gemini_api_key: get("GEMINI_API_KEY").map(SecretString::from),
            grok_api_key: get("GROK_API_KEY").map(SecretString::from),
            allowed_origin,
            gemini_model: get("LEAD_ASSIST_GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            grok_model: get("LEAD_ASSIST_GROK_MODEL").unwrap_or(defaults.grok_model),
            gemini_base_url: get("LEAD_ASSIST_GEMINI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_base_url),
            grok_base_url: get("LEAD_ASSIST_GROK_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.grok_base_url),
            temperature: defaults.temperature,
            max_output_tokens: defaults.max_output_tokens,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Delays of the handoff sequence.
///
/// The settle delay lets the user read the final reply; the close grace lets
/// the chat panel finish closing before the intake form appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffTiming {
    pub settle: Duration,
    pub panel_close: Duration,
}

impl Default for HandoffTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(800),
            panel_close: Duration::from_millis(400),
        }
    }
}

impl HandoffTiming {
    /// No delays at all, for tests and non-animated surfaces.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            panel_close: Duration::ZERO,
        }
    }
}

/// Client-side (orchestrator) configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the gateway proxy endpoint.
    pub gateway_url: String,
    /// Backend selected at session start.
    pub model: ModelSelector,
    pub handoff: HandoffTiming,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: format!("http://127.0.0.1:8888{GATEWAY_PATH}"),
            model: ModelSelector::default(),
            handoff: HandoffTiming::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let model = match get("LEAD_ASSIST_MODEL") {
            Some(raw) => raw.parse::<ModelSelector>().map_err(|message| ConfigError::InvalidValue {
                key: "LEAD_ASSIST_MODEL".to_string(),
                message,
            })?,
            None => defaults.model,
        };

        let settle = match get("LEAD_ASSIST_HANDOFF_SETTLE_MS") {
            Some(raw) => Duration::from_millis(parse_value("LEAD_ASSIST_HANDOFF_SETTLE_MS", &raw)?),
            None => defaults.handoff.settle,
        };
        let panel_close = match get("LEAD_ASSIST_PANEL_CLOSE_MS") {
            Some(raw) => Duration::from_millis(parse_value("LEAD_ASSIST_PANEL_CLOSE_MS", &raw)?),
            None => defaults.handoff.panel_close,
        };

        Ok(Self {
            gateway_url: get("LEAD_ASSIST_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            model,
            handoff: HandoffTiming {
                settle,
                panel_close,
            },
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}
