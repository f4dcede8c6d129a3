//! Site UI state the handoff drives: chat panel visibility, the active panel,
//! and the intake form behind it.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{IntakeField, IntakeForm};
use crate::directives::LeadPrefill;
use crate::orchestrator::HandoffSink;

/// Panel shown over the page, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivePanel {
    #[default]
    None,
    IntakeForm,
}

#[derive(Debug, Default)]
struct PanelState {
    chat_open: bool,
    active: ActivePanel,
}

/// Shared UI state for one visitor.
#[derive(Debug, Default)]
pub struct SiteSurface {
    panels: RwLock<PanelState>,
    form: RwLock<IntakeForm>,
}

impl SiteSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_chat_open(&self, open: bool) {
        self.panels.write().await.chat_open = open;
    }

    pub async fn is_chat_open(&self) -> bool {
        self.panels.read().await.chat_open
    }

    pub async fn active_panel(&self) -> ActivePanel {
        self.panels.read().await.active
    }

    /// Open a blank intake form without going through the chat.
    pub async fn open_form_manually(&self) {
        self.form.write().await.reset();
        self.panels.write().await.active = ActivePanel::IntakeForm;
    }

    /// Close the intake form. Its contents are discarded.
    pub async fn close_form(&self) {
        self.panels.write().await.active = ActivePanel::None;
        self.form.write().await.reset();
    }

    pub async fn set_field(&self, field: IntakeField, value: impl Into<String>) {
        self.form.write().await.set_field(field, value);
    }

    /// Copy of the current form state.
    pub async fn form(&self) -> IntakeForm {
        self.form.read().await.clone()
    }
}

#[async_trait]
impl HandoffSink for SiteSurface {
    async fn close_chat_panel(&self) {
        self.set_chat_open(false).await;
    }

    async fn apply_prefill(&self, prefill: &LeadPrefill) {
        let mut form = self.form.write().await;
        form.apply_prefill(prefill);
        debug!(fields = form.prefilled_fields().count(), "Applied intake prefill");
    }

    async fn open_intake_form(&self) {
        self.panels.write().await.active = ActivePanel::IntakeForm;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::HandoffTiming;
    use crate::directives::HandoffDirective;
    use crate::orchestrator::handoff::run_handoff;

    #[tokio::test]
    async fn handoff_closes_chat_and_opens_prefilled_form() {
        let surface = Arc::new(SiteSurface::new());
        surface.set_chat_open(true).await;

        let directive = HandoffDirective {
            prefill: LeadPrefill {
                name: Some("Jane".into()),
                details: Some("Support bot for our store".into()),
                ..Default::default()
            },
            confidence: 0.8,
        };
        run_handoff(surface.clone(), directive, HandoffTiming::immediate()).await;

        assert!(!surface.is_chat_open().await);
        assert_eq!(surface.active_panel().await, ActivePanel::IntakeForm);

        let form = surface.form().await;
        assert!(form.is_prefilled_from_chat());
        assert_eq!(form.value(IntakeField::Description), Some("Support bot for our store"));
    }

    #[tokio::test]
    async fn closing_form_discards_prefill() {
        let surface = SiteSurface::new();
        surface
            .apply_prefill(&LeadPrefill {
                budget: Some("$5k".into()),
                ..Default::default()
            })
            .await;
        surface.open_intake_form().await;

        surface.close_form().await;
        assert_eq!(surface.active_panel().await, ActivePanel::None);
        assert!(!surface.form().await.has_user_data());
    }

    #[tokio::test]
    async fn manual_open_starts_blank() {
        let surface = SiteSurface::new();
        surface.set_field(IntakeField::Email, "a@b.co").await;

        surface.open_form_manually().await;
        assert_eq!(surface.active_panel().await, ActivePanel::IntakeForm);
        assert_eq!(surface.form().await, IntakeForm::default());
    }
}
