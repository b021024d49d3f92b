//! Unwraps the generated text from the oracle's JSON envelope.
//!
//! This is the trust boundary with the external service: any envelope that does
//! not carry a string `response` field degrades to a diagnostic string that starts
//! with the failure prefix, so downstream stages reject it with the same check
//! they use for transport failures.

use super::oracle_client::{FAILURE_PREFIX, failure};
use serde_json::Value;

pub const MISSING_RESPONSE: &str = "Error: the oracle envelope has no 'response' field";
pub const EMPTY_RESPONSE: &str = "Error: the oracle envelope carried an empty response";

/// Extracts the generated text from a raw oracle reply.
pub fn extract_response(raw: &str) -> String {
    if raw.starts_with(FAILURE_PREFIX) {
        return raw.to_string();
    }

    let envelope: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return failure(format!("could not decode the oracle envelope: {}", e)),
    };

    match envelope.get("response") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) => EMPTY_RESPONSE.to_string(),
        Some(_) | None => MISSING_RESPONSE.to_string(),
    }
}
