//! Directive parser — pulls control directives out of model replies.
//!
//! The model appends up to two single-line commands to its reply:
//!
//! ```text
//! [CHIPS:["Option 1","Option 2"]]
//! [ACTION:OPEN_FORM]{"prefill":{"name":"Jane"},"confidence":0.8}
//! ```
//!
//! Both are stripped from the text shown to the user whether or not their
//! payload parses. A marker whose payload cannot be delimited is removed up to
//! the end of its line, so raw control syntax never reaches the chat.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DirectiveError;

/// Most chips ever shown at once.
pub const MAX_CHIPS: usize = 4;

/// Lead data the model collected, as carried by the handoff directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPrefill {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub service: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub budget: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeline: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub details: Option<String>,
}

impl LeadPrefill {
    /// True when no field carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// `(key, value)` pairs for the fields that are set, in directive order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("name", &self.name),
            ("service", &self.service),
            ("budget", &self.budget),
            ("timeline", &self.timeline),
            ("details", &self.details),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
    }
}

/// Accept a prefill value the model wrote as a string, number or bool.
/// Anything else (null, arrays, objects) drops just that field.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// A qualified-lead handoff requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffDirective {
    pub prefill: LeadPrefill,
    /// Model's confidence that the lead is qualified, clamped to `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct HandoffPayload {
    prefill: Option<LeadPrefill>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Result of parsing one model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    /// Reply text with every directive removed, trimmed.
    pub display_text: String,
    /// Suggestion chips, empty when absent or malformed.
    pub chips: Vec<String>,
    pub handoff: Option<HandoffDirective>,
    /// Directives that were present but unusable. Already stripped from the text.
    pub issues: Vec<DirectiveError>,
}

/// Compiled directive markers.
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    chips: Regex,
    handoff: Regex,
}

impl Default for DirectiveParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectiveParser {
    pub fn new() -> Self {
        Self {
            // Patterns are literals, compilation cannot fail.
            chips: Regex::new(r"\[CHIPS:").unwrap(),
            handoff: Regex::new(r"\[ACTION:OPEN_FORM\]").unwrap(),
        }
    }

    /// Split a raw reply into display text and structured directives.
    pub fn extract(&self, raw: &str) -> ParsedReply {
        let mut text = raw.to_string();
        let mut issues = Vec::new();

        let chips = match take_first(&mut text, &self.chips, Terminator::Bracket) {
            Some(Ok(value)) => parse_chips(value),
            Some(Err(Unusable::Unterminated)) => Err(DirectiveError::Unterminated("CHIPS")),
            Some(Err(Unusable::Invalid(reason))) => Err(DirectiveError::MalformedChips(reason)),
            None => Ok(Vec::new()),
        }
        .unwrap_or_else(|e| {
            issues.push(e);
            Vec::new()
        });

        let handoff = match take_first(&mut text, &self.handoff, Terminator::None) {
            Some(Ok(value)) => parse_handoff(value).map(Some),
            Some(Err(Unusable::Unterminated)) => {
                Err(DirectiveError::Unterminated("ACTION:OPEN_FORM"))
            }
            Some(Err(Unusable::Invalid(reason))) => Err(DirectiveError::MalformedHandoff(reason)),
            None => Ok(None),
        }
        .unwrap_or_else(|e| {
            issues.push(e);
            None
        });

        ParsedReply {
            display_text: text.trim().to_string(),
            chips,
            handoff,
            issues,
        }
    }
}

/// Why a directive payload could not be delimited.
enum Unusable {
    /// Input ended, or the closing bracket is missing.
    Unterminated,
    Invalid(String),
}

/// What must follow the JSON payload for the directive to be complete.
#[derive(Clone, Copy)]
enum Terminator {
    /// A closing `]`, as in `[CHIPS:[...]]`.
    Bracket,
    None,
}

/// Remove every occurrence of `marker` from `text`, returning the payload of
/// the first one. Later occurrences are dropped unparsed.
fn take_first(
    text: &mut String,
    marker: &Regex,
    terminator: Terminator,
) -> Option<Result<Value, Unusable>> {
    let mut first = None;

    while let Some((start, payload_start)) = marker.find(text).map(|m| (m.start(), m.end())) {
        let (end, payload) = delimit(text, start, payload_start, terminator);
        splice_out(text, start, end);
        if first.is_none() {
            first = Some(payload);
        } else {
            tracing::debug!(marker = marker.as_str(), "Dropping repeated directive");
        }
    }

    first
}

/// Find where a directive starting at `start` ends and parse its payload.
///
/// On any failure the directive extends to the end of the line.
fn delimit(
    text: &str,
    start: usize,
    payload_start: usize,
    terminator: Terminator,
) -> (usize, Result<Value, Unusable>) {
    let line_end = text[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(text.len());

    let rest = &text[payload_start..];
    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    let value = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(e)) if e.is_eof() => return (line_end, Err(Unusable::Unterminated)),
        Some(Err(e)) => return (line_end, Err(Unusable::Invalid(e.to_string()))),
        None => return (line_end, Err(Unusable::Unterminated)),
    };
    let mut end = payload_start + stream.byte_offset();

    if let Terminator::Bracket = terminator {
        let after = &text[end..];
        let skipped = after.len() - after.trim_start_matches([' ', '\t']).len();
        if after[skipped..].starts_with(']') {
            end += skipped + 1;
        } else {
            return (line_end, Err(Unusable::Unterminated));
        }
    }

    (end, Ok(value))
}

/// Remove `text[start..end]`, collapsing the horizontal whitespace around it.
fn splice_out(text: &mut String, start: usize, end: usize) {
    let left = text[..start].trim_end_matches([' ', '\t']);
    let right = text[end..].trim_start_matches([' ', '\t']);

    let touches_line_break = left.ends_with('\n') || right.starts_with('\n');
    let joiner = if left.is_empty() || right.is_empty() || touches_line_break {
        ""
    } else {
        " "
    };

    *text = format!("{left}{joiner}{right}");
}

fn parse_chips(value: Value) -> Result<Vec<String>, DirectiveError> {
    let chips: Vec<String> = serde_json::from_value(value)
        .map_err(|e| DirectiveError::MalformedChips(e.to_string()))?;

    Ok(chips
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .take(MAX_CHIPS)
        .collect())
}

fn parse_handoff(value: Value) -> Result<HandoffDirective, DirectiveError> {
    let payload: HandoffPayload = serde_json::from_value(value)
        .map_err(|e| DirectiveError::MalformedHandoff(e.to_string()))?;

    let prefill = payload.prefill.ok_or(DirectiveError::MissingPrefill)?;
    let confidence = payload
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Ok(HandoffDirective {
        prefill,
        confidence,
    })
}
