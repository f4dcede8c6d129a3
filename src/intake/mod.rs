//! Lead intake form — field values plus which of them the assistant filled in.

pub mod surface;

pub use surface::{ActivePanel, SiteSurface};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::directives::LeadPrefill;

/// Fields of the project intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntakeField {
    ProjectType,
    Budget,
    Timeline,
    Description,
    CurrentSituation,
    Goals,
    SuccessMetrics,
    Name,
    Email,
    Phone,
    Company,
}

impl IntakeField {
    pub const ALL: [IntakeField; 11] = [
        Self::ProjectType,
        Self::Budget,
        Self::Timeline,
        Self::Description,
        Self::CurrentSituation,
        Self::Goals,
        Self::SuccessMetrics,
        Self::Name,
        Self::Email,
        Self::Phone,
        Self::Company,
    ];

    /// Form field a handoff prefill key lands in.
    pub fn from_prefill_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "service" => Some(Self::ProjectType),
            "budget" => Some(Self::Budget),
            "timeline" => Some(Self::Timeline),
            "details" => Some(Self::Description),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectType => "projectType",
            Self::Budget => "budget",
            Self::Timeline => "timeline",
            Self::Description => "description",
            Self::CurrentSituation => "currentSituation",
            Self::Goals => "goals",
            Self::SuccessMetrics => "successMetrics",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Company => "company",
        }
    }
}

impl std::fmt::Display for IntakeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntakeField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown intake field '{s}'"))
    }
}

/// State of the intake form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeForm {
    values: BTreeMap<IntakeField, String>,
    /// Fields whose current value came from the assistant.
    prefilled: BTreeSet<IntakeField>,
}

impl IntakeForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the form contents with an assistant prefill.
    ///
    /// Blank prefill values are skipped and leave their field empty.
    pub fn apply_prefill(&mut self, prefill: &LeadPrefill) {
        self.reset();
        for (key, value) in prefill.entries() {
            if let Some(field) = IntakeField::from_prefill_key(key) {
                self.values.insert(field, value.to_string());
                self.prefilled.insert(field);
            }
        }
    }

    /// User edit. The field stops counting as assistant-sourced.
    pub fn set_field(&mut self, field: IntakeField, value: impl Into<String>) {
        let value = value.into();
        self.prefilled.remove(&field);
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    pub fn value(&self, field: IntakeField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_ai_sourced(&self, field: IntakeField) -> bool {
        self.prefilled.contains(&field)
    }

    pub fn prefilled_fields(&self) -> impl Iterator<Item = IntakeField> + '_ {
        self.prefilled.iter().copied()
    }

    /// Whether any field still holds an assistant-provided value.
    pub fn is_prefilled_from_chat(&self) -> bool {
        !self.prefilled.is_empty()
    }

    /// Whether anything was typed or prefilled.
    pub fn has_user_data(&self) -> bool {
        self.values.values().any(|v| !v.trim().is_empty())
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.prefilled.clear();
    }
}
