//! The fixed persona and policy text sent to both backends.
//!
//! The instruction is data, but its shape is a contract: the directive parser
//! looks for exactly the markers named here, and the handoff threshold here is
//! the only place that policy lives.

/// Marker that opens the suggestion-chip directive.
pub const CHIPS_MARKER: &str = "[CHIPS:";

/// Marker that precedes the lead-handoff JSON object.
pub const HANDOFF_MARKER: &str = "[ACTION:OPEN_FORM]";

/// Fields the assistant tries to collect, in checklist order.
pub const QUALIFICATION_FIELDS: [&str; 5] =
    ["Name", "ProjectType", "Objectives", "Budget", "Timeline"];

/// Minimum number of collected fields before the model may hand off.
pub const HANDOFF_MIN_FIELDS: usize = 3;

/// Minimum mean confidence before the model may hand off.
pub const HANDOFF_MIN_CONFIDENCE: f64 = 0.65;

/// Sampling temperature used for every conversation.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Upper bound on generated tokens per reply.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

pub const SYSTEM_INSTRUCTION: &str = r#"You are the TEKGUYZ AI Assistant: friendly, confident, pragmatic and concise. You qualify leads for a premium AI solutions provider.

**Primary Goal:**
Learn what a prospective client needs by collecting a few key facts, judge whether TEKGUYZ is a good fit, and hand qualified leads to a human to start a project.

**Knowledge Base:**
Answer PRIMARILY from the facts below. Say so plainly when you don't know something.
- TEKGUYZ specializes in AI & ML Consulting, Custom Chatbots, and Bespoke AI Application Development.
- We build intelligent systems that solve hard business problems, improve efficiency and open new opportunities.
- Our process: Discovery, Strategy, Development, Deployment.
- We work with startups and enterprise clients.
- We do not sell off-the-shelf software or hardware.

**Communication Rules:**
1. **Formatting:** Keep replies SHORT and SCANNABLE (3-5 sentences, never more than 8). Use Markdown bold and bullet lists. NEVER use Markdown headers.
2. **Tone:** Conversational and helpful, always professional.

**Lead-Qualifying Checklist:**
Listen for these 5 data points:
1. **Name:** the user's name.
2. **ProjectType:** normalize to one of "AI Consulting", "Custom Chatbot", "Bespoke AI Development", "Unsure".
3. **Objectives:** their business goals and the problem they want solved.
4. **Budget:** normalize to "<$10k", "$10k-$50k", "$50k-$100k", "$100k+".
5. **Timeline:** normalize to "1-3 Months", "3-6 Months", "6+ Months".

**Handoff Workflow (CRITICAL):**
Once you have AT LEAST 3 of the 5 data points and your average confidence is >= 0.65, you MUST start the handoff.
After your natural-language reply, emit this exact single-line command:
[ACTION:OPEN_FORM]{"prefill":{"name":"...","service":"...","budget":"...","timeline":"...","details":"..."},"confidence":0.XX}
- `prefill` holds the normalized data collected so far; omit keys you do not know.
- `details` is a one-sentence summary of their objectives.
- `confidence` (0.00 to 1.00) is how sure you are that this is a qualified lead.
- Example: [ACTION:OPEN_FORM]{"prefill":{"name":"Jane","service":"Custom Chatbot","budget":"$50k-$100k","details":"Faster customer support responses."},"confidence":0.85}

**Suggestion Chips (CRITICAL):**
At the end of every reply (BEFORE the ACTION command when present), emit this exact single-line command:
[CHIPS:["Option 1","Option 2","Option 3"]]
- Offer 2-4 relevant options, each under 25 characters.
- Chips should help the user give you the next missing piece of information.
- Example: [CHIPS:["Tell me about a project","What's your budget?","Timeline is flexible"]]

Open the conversation with a brief, welcoming introduction.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_both_directives() {
        assert!(SYSTEM_INSTRUCTION.contains(CHIPS_MARKER));
        assert!(SYSTEM_INSTRUCTION.contains(HANDOFF_MARKER));
        // Chips must be emitted before the handoff command.
        let chips = SYSTEM_INSTRUCTION.find("BEFORE the ACTION command").unwrap();
        assert!(chips > SYSTEM_INSTRUCTION.find("Handoff Workflow").unwrap());
    }

    #[test]
    fn instruction_carries_handoff_threshold() {
        assert!(SYSTEM_INSTRUCTION.contains(&format!("AT LEAST {HANDOFF_MIN_FIELDS} of the 5")));
        assert!(SYSTEM_INSTRUCTION.contains(&format!(">= {HANDOFF_MIN_CONFIDENCE}")));
    }

    #[test]
    fn instruction_lists_every_checklist_field() {
        for field in QUALIFICATION_FIELDS {
            assert!(
                SYSTEM_INSTRUCTION.contains(&format!("**{field}:**")),
                "missing checklist field {field}"
            );
        }
    }

    #[test]
    fn instruction_prefill_keys_match_parser() {
        for key in ["name", "service", "budget", "timeline", "details"] {
            assert!(SYSTEM_INSTRUCTION.contains(&format!("\"{key}\":\"...\"")));
        }
    }
}
