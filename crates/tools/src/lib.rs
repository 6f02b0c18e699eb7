//! Society Scribe Tools
//!
//! Everything between raw generated text and a tool dispatch, plus the
//! shaping of tool results on the way back:
//! - `extract_candidate` - find a tool-call envelope in free-form text
//! - `parse_tool_call` / `sanitize` - strict-then-repaired structural parse
//! - `DuplicateCallGuard` - back-to-back repeat detection
//! - `CompactionPolicy` - tool-result compaction and usage hints
//! - `prompt` - fixed system texts and the tool catalog prompt
//!
//! Nothing here performs I/O; the bridge and the agent loop live in the
//! main crate.

pub mod compact;
pub mod extractor;
pub mod guard;
pub mod prompt;
pub mod sanitizer;

// Re-export core types
pub use compact::{error_payload, search_results_hint, truncate_chars, CompactionPolicy};
pub use extractor::{extract_candidate, Candidate, EnvelopeForm, ENVELOPE_MARKER};
pub use guard::{DuplicateCallGuard, ToolCallSignature, GUARD_WINDOW};
pub use sanitizer::{extract_call, parse_tool_call, sanitize, ParsedToolCall};
