//! Tool-Call Extraction
//!
//! Locates a candidate tool-call envelope inside free-form generated text.
//! Three surface forms are tried in priority order, first match wins:
//! - Pass 1: `` ```json { ... } ``` `` fenced blocks
//! - Pass 2: `<tool_call>{ ... }</tool_call>` tag pairs
//! - Pass 3: the first bare balanced `{ ... }` object mentioning `tool_call`
//!
//! Extraction never validates the JSON; that is the sanitizer's job.

use std::sync::OnceLock;

use regex::Regex;

/// Key that identifies a tool-call wrapper object in bare text.
pub const ENVELOPE_MARKER: &str = "tool_call";

/// Which surface form produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeForm {
    Fenced,
    Tagged,
    Bare,
}

impl EnvelopeForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeForm::Fenced => "fenced",
            EnvelopeForm::Tagged => "tagged",
            EnvelopeForm::Bare => "bare",
        }
    }
}

/// A raw JSON-looking substring believed to encode a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub raw: &'a str,
    pub form: EnvelopeForm,
}

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?is)```json\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

fn tag_pattern() -> Option<&'static Regex> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?is)<tool_call>\s*(\{.*?\})\s*</tool_call>").ok())
        .as_ref()
}

fn first_capture<'a>(pattern: Option<&Regex>, text: &'a str) -> Option<&'a str> {
    pattern?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Find a tool-call candidate in `text`.
///
/// Returns `None` for empty text or text with no recognizable envelope.
pub fn extract_candidate(text: &str) -> Option<Candidate<'_>> {
    if text.is_empty() {
        return None;
    }

    if let Some(raw) = first_capture(fence_pattern(), text) {
        return Some(Candidate {
            raw,
            form: EnvelopeForm::Fenced,
        });
    }

    if let Some(raw) = first_capture(tag_pattern(), text) {
        return Some(Candidate {
            raw,
            form: EnvelopeForm::Tagged,
        });
    }

    scan_bare_object(text).map(|raw| Candidate {
        raw,
        form: EnvelopeForm::Bare,
    })
}

/// Balanced-brace scan for the first object containing the envelope marker.
///
/// Objects that balance but lack the marker are skipped by restarting at the
/// next `{` after their opening brace. Braces are ASCII, so byte offsets are
/// always char boundaries.
fn scan_bare_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = text.find('{');

    while let Some(open) = start {
        let mut depth: usize = 0;
        for (offset, &b) in bytes[open..].iter().enumerate() {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let chunk = &text[open..=open + offset];
                        if chunk.contains(ENVELOPE_MARKER) {
                            return Some(chunk);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        start = text[open + 1..].find('{').map(|next| open + 1 + next);
    }

    None
}
