//! Handoff sequence — moves a qualified lead from the chat into the intake form.
//!
//! Runs as its own task so the conversation is idle again while it plays out.
//! Steps are strictly ordered: settle, close the chat panel (awaited), let the
//! close finish, apply the prefill, open the form.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::HandoffTiming;
use crate::directives::{HandoffDirective, LeadPrefill};

/// The UI surfaces a handoff drives.
#[async_trait]
pub trait HandoffSink: Send + Sync {
    /// Close the chat panel. Returns once the panel is closed.
    async fn close_chat_panel(&self);

    /// Overwrite the intake form with the model's prefill.
    async fn apply_prefill(&self, prefill: &LeadPrefill);

    /// Show the intake form.
    async fn open_intake_form(&self);
}

/// Handle to a running handoff sequence.
#[derive(Debug)]
pub struct HandoffTask {
    handle: JoinHandle<()>,
}

impl HandoffTask {
    pub(crate) fn spawn(
        sink: Arc<dyn HandoffSink>,
        directive: HandoffDirective,
        timing: HandoffTiming,
    ) -> Self {
        Self {
            handle: tokio::spawn(run_handoff(sink, directive, timing)),
        }
    }

    /// Wait for the sequence to finish.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Handoff sequence did not complete");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Play the handoff sequence to completion.
pub async fn run_handoff(
    sink: Arc<dyn HandoffSink>,
    directive: HandoffDirective,
    timing: HandoffTiming,
) {
    info!(
        confidence = directive.confidence,
        fields = directive.prefill.entries().count(),
        "Starting lead handoff"
    );

    tokio::time::sleep(timing.settle).await;
    sink.close_chat_panel().await;
    tokio::time::sleep(timing.panel_close).await;
    sink.apply_prefill(&directive.prefill).await;
    sink.open_intake_form().await;

    info!("Lead handoff complete, intake form open");
}
