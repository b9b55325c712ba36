//! Post-processing: turn the model's reply text into an [`ExtractionResult`].
//!
//! Models are told to "return only the JSON object", and most of the time
//! they wrap it in a ```` ```json ```` fence anyway. Fence removal has to be
//! tolerant: fences can be longer than three backticks, the language tag
//! varies (`json`, `JSON`, `jsonc`, none), and replies often carry trailing
//! whitespace or a final newline after the closing fence. Fixed-offset
//! slicing gets all of those wrong, so this module matches the fence with a
//! regex instead.
//!
//! Two rules, applied in order:
//! 1. Strip one outer code fence if the whole reply is fenced
//! 2. Parse the remainder as JSON and run it through the schema gate

use crate::error::InvoiceError;
use crate::invoice::ExtractionResult;
use once_cell::sync::Lazy;
use regex::Regex;

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

/// Opening run of 3+ backticks, optional info string, newline, body, then a
/// closing run of the same length (backreferences are unavailable, so the
/// closing run is checked in code).
static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(`{3,})[ \t]*([A-Za-z0-9_+.-]*)[ \t]*\r?\n?(.*?)\r?\n?[ \t]*(`{3,})$").unwrap()
});

/// Remove a surrounding code fence, if present.
///
/// Idempotent: an unfenced string comes back trimmed and otherwise unchanged,
/// so calling this twice gives the same result as calling it once.
pub fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCE.captures(trimmed) {
        let open = caps.get(1).map_or(0, |m| m.as_str().len());
        let close = caps.get(4).map_or(0, |m| m.as_str().len());
        if open == close {
            if let Some(body) = caps.get(3) {
                return body.as_str().trim();
            }
        }
    }
    trimmed
}

// ── Rule 2: Parse and validate ───────────────────────────────────────────────

/// Parse the reply body (fenced or not) as JSON text.
pub fn parse_reply_json(reply: &str) -> Result<serde_json::Value, InvoiceError> {
    let body = strip_code_fence(reply);
    if body.is_empty() {
        return Err(InvoiceError::ExtractionParse {
            reason: "empty response".to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| InvoiceError::ExtractionParse {
        reason: e.to_string(),
    })
}

/// Full post-processing: fence stripping, JSON parsing and schema validation.
pub fn parse_extraction(reply: &str, strict: bool) -> Result<ExtractionResult, InvoiceError> {
    let value = parse_reply_json(reply)?;
    ExtractionResult::from_value(value, strict)
}
