use super::oracle_client::{Oracle, oracle_failure};
use super::response_extractor::extract_response;
use crate::data::{GenerationRequest, PathRejection, PlanItem};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// File the raw plan text is saved to, next to the plan's source
pub const PLAN_AUDIT_FILE: &str = "implementation_plan.json";

const PATH_KEYS: &[&str] = &["name", "path"];
const INSTRUCTION_KEYS: &[&str] = &["instructions", "instruction"];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no '{open}' ... '{close}' span in the text")]
    NoDelimiters { open: char, close: char },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected shape: {0}")]
    Shape(&'static str),
}

type Strategy = fn(&str) -> Result<Vec<PlanItem>, DecodeError>;

/// Decode strategies in the order they are tried
static STRATEGIES: &[(&str, Strategy)] = &[
    ("array", decode_array),
    ("object", decode_object),
    ("map", decode_map),
];

/// Decodes a plan from generated text, trying each strategy until one succeeds.
///
/// Returns the error of the last strategy when none does.
pub fn decode_plan(text: &str) -> Result<Vec<PlanItem>, DecodeError> {
    let mut last_error = DecodeError::Shape("no strategy attempted");
    for (name, strategy) in STRATEGIES {
        match strategy(text) {
            Ok(items) => {
                tracing::debug!(strategy = *name, items = items.len(), "decoded plan");
                return Ok(items);
            }
            Err(e) => {
                tracing::debug!(strategy = *name, "plan decode failed: {}", e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// The span from the first `open` to the last `close`, both included.
fn delimited(text: &str, open: char, close: char) -> Result<&str, DecodeError> {
    let start = text.find(open);
    let end = text.rfind(close);
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&text[s..=e]),
        _ => Err(DecodeError::NoDelimiters { open, close }),
    }
}

fn decode_array(text: &str) -> Result<Vec<PlanItem>, DecodeError> {
    let value: Value = serde_json::from_str(delimited(text, '[', ']')?)?;
    let Value::Array(elements) = value else {
        return Err(DecodeError::Shape("not an array"));
    };
    elements
        .iter()
        .map(|element| match element {
            Value::Object(fields) => item_from_fields(fields),
            _ => Err(DecodeError::Shape("array element is not an object")),
        })
        .collect()
}

fn decode_object(text: &str) -> Result<Vec<PlanItem>, DecodeError> {
    let value: Value = serde_json::from_str(delimited(text, '{', '}')?)?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::Shape("not an object"));
    };
    Ok(vec![item_from_fields(&fields)?])
}

fn decode_map(text: &str) -> Result<Vec<PlanItem>, DecodeError> {
    let fields: Map<String, Value> = serde_json::from_str(delimited(text, '{', '}')?)?;
    Ok(fields
        .into_iter()
        .map(|(path, value)| {
            let instruction = match &value {
                Value::Object(inner) => field(inner, INSTRUCTION_KEYS)
                    .map(value_text)
                    .unwrap_or_default(),
                Value::String(s) => s.clone(),
                _ => String::new(),
            };
            PlanItem::new(path, instruction)
        })
        .collect())
}

fn item_from_fields(fields: &Map<String, Value>) -> Result<PlanItem, DecodeError> {
    let path = field(fields, PATH_KEYS)
        .and_then(Value::as_str)
        .ok_or(DecodeError::Shape("object has no string name/path field"))?;
    let instruction = field(fields, INSTRUCTION_KEYS)
        .map(value_text)
        .unwrap_or_default();
    Ok(PlanItem::new(path, instruction))
}

/// Case-insensitive lookup of the first of `keys` present in `fields`.
fn field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Result of requesting a plan from the oracle
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Decoded {
        items: Vec<PlanItem>,
        attempts: usize,
    },
    /// Every attempt failed; holds the text of the final attempt
    Exhausted {
        attempts: usize,
        last_response: String,
    },
}

/// Requests a plan and decodes it, re-asking the oracle until an attempt decodes.
pub struct PlanParser {
    max_attempts: usize,
    audit_path: Option<PathBuf>,
}

impl Default for PlanParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl PlanParser {
    /// Creates a parser that makes at most `max_attempts` oracle calls (at least one).
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            audit_path: None,
        }
    }

    /// Saves each attempt's text to `path` before it is decoded.
    pub fn with_audit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_path = Some(path.into());
        self
    }

    pub async fn request_plan<O: Oracle>(
        &self,
        oracle: &O,
        request: &GenerationRequest,
    ) -> PlanOutcome {
        let mut last_response = String::new();
        for attempt in 1..=self.max_attempts {
            let raw = oracle.generate(request).await;
            let text = extract_response(&raw);
            self.write_audit(&text).await;

            if let Some(message) = oracle_failure(&text) {
                tracing::warn!(attempt, "plan request failed: {}", message);
            } else {
                match decode_plan(&text) {
                    Ok(items) => {
                        return PlanOutcome::Decoded {
                            items,
                            attempts: attempt,
                        };
                    }
                    Err(e) => tracing::warn!(attempt, "could not decode plan: {}", e),
                }
            }
            last_response = text;
        }
        PlanOutcome::Exhausted {
            attempts: self.max_attempts,
            last_response,
        }
    }

    async fn write_audit(&self, text: &str) {
        let Some(path) = &self.audit_path else {
            return;
        };
        if let Err(e) = tokio::fs::write(path, text).await {
            tracing::warn!("Failed to write plan audit file {}: {}", path.display(), e);
        }
    }
}

/// Where the plan audit file for `source` goes: inside a directory source,
/// beside a file source.
pub fn plan_audit_path(source: &Path) -> PathBuf {
    if source.is_dir() {
        return source.join(PLAN_AUDIT_FILE);
    }
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(PLAN_AUDIT_FILE),
        _ => PathBuf::from(PLAN_AUDIT_FILE),
    }
}

/// A decoded plan split into usable items and the ones dropped for bad paths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedPlan {
    pub items: Vec<PlanItem>,
    pub dropped: Vec<(PlanItem, PathRejection)>,
}

impl ValidatedPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn validate_plan(items: Vec<PlanItem>) -> ValidatedPlan {
    let mut plan = ValidatedPlan::default();
    for item in items {
        match item.validate() {
            Ok(()) => plan.items.push(item),
            Err(rejection) => {
                tracing::warn!("Dropping plan item: {}", rejection);
                plan.dropped.push((item, rejection));
            }
        }
    }
    plan
}
