//! Conversation orchestrator — owns one chat session.
//!
//! Single-flight state machine over idle / sending / degraded. The gateway
//! call is the only suspension point; the conversation lock is never held
//! across it.

pub mod client;
pub mod handoff;

pub use client::{GatewayClient, GatewayReply, HttpGatewayClient};
pub use handoff::{HandoffSink, HandoffTask};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HandoffTiming;
use crate::directives::DirectiveParser;
use crate::gateway::GatewayRequest;
use crate::llm::{ConversationMessage, ModelSelector};

pub const WELCOME_MESSAGE: &str = "Hi! I'm the TEKGUYZ AI Assistant. I can help answer your questions and see if our solutions are a good fit for your project. What can I help you with today?";

pub const STARTER_CHIPS: [&str; 3] = [
    "What services do you offer?",
    "Tell me about your process.",
    "Can you build a custom chatbot?",
];

pub const OFFLINE_MESSAGE: &str = "Our AI assistant is temporarily unavailable. Please use the contact form instead or try again later.";

pub const CONNECTION_ERROR_MESSAGE: &str =
    "A connection error occurred. Please check your network and try again.";

pub const EMPTY_REPLY_MESSAGE: &str = "Sorry, I couldn't process that. Please try again.";

/// Where the conversation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Idle,
    Sending,
    Degraded,
}

impl ChatState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ChatState) -> bool {
        use ChatState::*;
        matches!(
            (self, target),
            (Idle, Sending)
                | (Sending, Idle)
                | (Sending, Degraded)
                | (Idle, Degraded)
                | (Degraded, Idle)
        )
    }

    /// Whether a new message may be sent.
    pub fn accepts_input(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ChatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Degraded => "degraded",
        };
        write!(f, "{s}")
    }
}

/// Why a send was refused without touching the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A request is already in flight.
    Busy,
    /// The backend reported itself unavailable.
    Offline,
    /// Nothing but whitespace.
    EmptyMessage,
    /// No chip at that position.
    NoSuchChip,
}

/// What a call to [`Orchestrator::send_message`] did.
#[derive(Debug)]
pub enum SendOutcome {
    Rejected(RejectReason),
    /// Reply appended and chips replaced.
    Replied {
        text: String,
        chips: Vec<String>,
        /// Running handoff sequence, when the model asked for one.
        handoff: Option<HandoffTask>,
    },
    /// Non-503 failure; the connection-error message was appended.
    Failed { message: String },
    /// 503 from the gateway; the session is now degraded.
    WentOffline { message: String },
    /// The conversation was reset while the request was in flight.
    Discarded,
}

/// Point-in-time view of the conversation, for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSnapshot {
    pub state: ChatState,
    pub history: Vec<ConversationMessage>,
    pub chips: Vec<String>,
    pub model: ModelSelector,
}

#[derive(Debug)]
struct Conversation {
    history: Vec<ConversationMessage>,
    chips: Vec<String>,
    model: ModelSelector,
    in_flight: bool,
    online: bool,
    /// Bumped on every reset so late replies can tell they are stale.
    generation: u64,
}

impl Conversation {
    fn new(model: ModelSelector) -> Self {
        Self {
            history: vec![ConversationMessage::model(WELCOME_MESSAGE)],
            chips: starter_chips(),
            model,
            in_flight: false,
            online: true,
            generation: 0,
        }
    }

    fn state(&self) -> ChatState {
        if !self.online {
            ChatState::Degraded
        } else if self.in_flight {
            ChatState::Sending
        } else {
            ChatState::Idle
        }
    }

    /// Apply `change` to the flags, keeping it only when the derived state
    /// stays put or moves along a valid edge. Returns `(from, to)` on success
    /// and the unchanged state otherwise.
    fn transition(
        &mut self,
        change: impl FnOnce(&mut Self),
    ) -> Result<(ChatState, ChatState), ChatState> {
        let from = self.state();
        let saved = (self.in_flight, self.online);
        change(self);
        let to = self.state();
        if from == to || from.can_transition_to(to) {
            Ok((from, to))
        } else {
            (self.in_flight, self.online) = saved;
            Err(from)
        }
    }
}

fn starter_chips() -> Vec<String> {
    STARTER_CHIPS.iter().map(|c| c.to_string()).collect()
}

/// Drives one chat session against a gateway.
pub struct Orchestrator {
    session_id: Uuid,
    gateway: Arc<dyn GatewayClient>,
    sink: Arc<dyn HandoffSink>,
    parser: DirectiveParser,
    timing: HandoffTiming,
    conversation: RwLock<Conversation>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        sink: Arc<dyn HandoffSink>,
        model: ModelSelector,
        timing: HandoffTiming,
    ) -> Self {
        let session_id = Uuid::new_v4();
        debug!(session = %session_id, model = %model, "Starting chat session");
        Self {
            session_id,
            gateway,
            sink,
            parser: DirectiveParser::new(),
            timing,
            conversation: RwLock::new(Conversation::new(model)),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Send a user message and process the reply.
    ///
    /// Rejected without side effects while a request is in flight, while
    /// degraded, or when the trimmed text is empty.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Rejected(RejectReason::EmptyMessage);
        }

        let (request, generation) = {
            let mut conv = self.conversation.write().await;
            let state = conv.state();
            if !state.accepts_input() {
                let reason = match state {
                    ChatState::Degraded => RejectReason::Offline,
                    _ => RejectReason::Busy,
                };
                return SendOutcome::Rejected(reason);
            }
            if conv.transition(|c| c.in_flight = true).is_err() {
                return SendOutcome::Rejected(RejectReason::Busy);
            }

            // Prior turns only: the welcome message and this message stay out.
            let history = conv.history[1..].to_vec();
            conv.history.push(ConversationMessage::user(text));
            conv.chips.clear();

            let request = GatewayRequest {
                history,
                message: text.to_string(),
                model: conv.model,
            };
            (request, conv.generation)
        };

        info!(
            session = %self.session_id,
            model = %request.model,
            history_len = request.history.len(),
            "Sending chat message"
        );

        let result = self
            .gateway
            .post_chat(&request)
            .await
            .and_then(GatewayReply::into_text);

        let mut conv = self.conversation.write().await;
        let unavailable = matches!(&result, Err(e) if e.is_service_unavailable());
        let settled = conv.transition(|c| {
            c.in_flight = false;
            if unavailable {
                c.online = false;
            }
        });
        if let Err(state) = settled {
            warn!(
                session = %self.session_id,
                state = %state,
                "Send settled from an unexpected state"
            );
            conv.in_flight = false;
        }
        let current = conv.generation == generation;

        match result {
            Ok(raw) => {
                if !current {
                    debug!(session = %self.session_id, "Dropping reply for a reset conversation");
                    return SendOutcome::Discarded;
                }

                let parsed = self.parser.extract(&raw);
                for issue in &parsed.issues {
                    warn!(
                        session = %self.session_id,
                        error = %issue,
                        "Ignoring malformed directive"
                    );
                }

                // Only a reply with nothing in it at all gets the apology; a
                // directive-only reply shows no text of its own.
                let text = if raw.trim().is_empty() {
                    EMPTY_REPLY_MESSAGE.to_string()
                } else {
                    parsed.display_text
                };
                conv.history.push(ConversationMessage::model(text.clone()));
                conv.chips = parsed.chips.clone();

                let handoff = match parsed.handoff {
                    Some(directive) if !directive.prefill.is_empty() => {
                        info!(
                            session = %self.session_id,
                            confidence = directive.confidence,
                            "Model requested lead handoff"
                        );
                        Some(HandoffTask::spawn(self.sink.clone(), directive, self.timing))
                    }
                    Some(_) => {
                        debug!(session = %self.session_id, "Handoff with empty prefill ignored");
                        None
                    }
                    None => None,
                };

                SendOutcome::Replied {
                    text,
                    chips: parsed.chips,
                    handoff,
                }
            }
            Err(e) if unavailable => {
                warn!(session = %self.session_id, error = %e, "AI service offline");
                if !current {
                    return SendOutcome::Discarded;
                }
                conv.history.push(ConversationMessage::model(OFFLINE_MESSAGE));
                SendOutcome::WentOffline {
                    message: OFFLINE_MESSAGE.to_string(),
                }
            }
            Err(e) => {
                error!(session = %self.session_id, error = %e, "Chat request failed");
                if !current {
                    return SendOutcome::Discarded;
                }
                conv.history
                    .push(ConversationMessage::model(CONNECTION_ERROR_MESSAGE));
                SendOutcome::Failed {
                    message: CONNECTION_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }

    /// Send the text of the chip at `index`.
    pub async fn select_chip(&self, index: usize) -> SendOutcome {
        let chip = self.conversation.read().await.chips.get(index).cloned();
        match chip {
            Some(text) => self.send_message(&text).await,
            None => SendOutcome::Rejected(RejectReason::NoSuchChip),
        }
    }

    pub async fn set_model(&self, model: ModelSelector) {
        let mut conv = self.conversation.write().await;
        if conv.model != model {
            info!(session = %self.session_id, from = %conv.model, to = %model, "Switching model");
            conv.model = model;
        }
    }

    pub async fn model(&self) -> ModelSelector {
        self.conversation.read().await.model
    }

    pub async fn state(&self) -> ChatState {
        self.conversation.read().await.state()
    }

    pub async fn history(&self) -> Vec<ConversationMessage> {
        self.conversation.read().await.history.clone()
    }

    pub async fn chips(&self) -> Vec<String> {
        self.conversation.read().await.chips.clone()
    }

    pub async fn snapshot(&self) -> ChatSnapshot {
        let conv = self.conversation.read().await;
        ChatSnapshot {
            state: conv.state(),
            history: conv.history.clone(),
            chips: conv.chips.clone(),
            model: conv.model,
        }
    }

    /// Back to the welcome message and starter chips.
    ///
    /// Keeps the model selection and the offline flag.
    pub async fn reset_conversation(&self) {
        let mut conv = self.conversation.write().await;
        conv.history = vec![ConversationMessage::model(WELCOME_MESSAGE)];
        conv.chips = starter_chips();
        conv.generation += 1;
        info!(session = %self.session_id, "Conversation reset");
    }

    /// External service-status switch; the only way out of `degraded`.
    pub async fn set_service_online(&self, online: bool) {
        let mut conv = self.conversation.write().await;
        match conv.transition(|c| c.online = online) {
            Ok((from, to)) if from != to => {
                info!(session = %self.session_id, from = %from, to = %to, "Service status changed");
            }
            Ok(_) => {}
            Err(state) => {
                warn!(
                    session = %self.session_id,
                    state = %state,
                    online,
                    "Service status change refused until the pending send settles"
                );
            }
        }
    }
}
