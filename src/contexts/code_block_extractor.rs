use super::oracle_client::colon_failure;
use thiserror::Error;

pub const FENCE: &str = "```";

/// Openers of conversational lines dropped from unfenced responses.
///
/// Best effort only: models invent new filler all the time.
pub const FILLER_PREFIXES: &[&str] = &["Here is", "Sure", "The code", "Note:"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodeExtractionError {
    #[error("no valid code extracted from the oracle response")]
    NoValidCode,
    #[error("the oracle call failed: {0}")]
    OracleFailure(String),
}

/// Extracts clean source lines from a generated response.
///
/// When any line opens a fence, only lines inside fences are kept. Otherwise every
/// line is kept except filler openers. Leading and trailing blank lines are trimmed;
/// interior blank lines survive.
pub fn extract_code_lines(text: &str) -> Vec<String> {
    let fenced = text.lines().any(|l| l.trim().starts_with(FENCE));

    let mut lines = Vec::new();
    let mut inside = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(FENCE) {
            inside = !inside;
            continue;
        }
        if fenced {
            if inside {
                lines.push(line.to_string());
            }
        } else if !is_filler(trimmed) {
            lines.push(line.to_string());
        }
    }

    trim_blank_edges(lines)
}

/// Like [`extract_code_lines`], but an empty result or a failure sentinel is an error.
pub fn extract_code_block(text: &str) -> Result<Vec<String>, CodeExtractionError> {
    if let Some(message) = colon_failure(text) {
        return Err(CodeExtractionError::OracleFailure(message.to_string()));
    }
    let lines = extract_code_lines(text);
    if lines.is_empty() {
        return Err(CodeExtractionError::NoValidCode);
    }
    Ok(lines)
}

fn is_filler(trimmed: &str) -> bool {
    FILLER_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

fn trim_blank_edges(mut lines: Vec<String>) -> Vec<String> {
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    lines.truncate(end);
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    lines.drain(..start);
    lines
}
