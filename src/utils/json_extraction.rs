//! Structured-record extraction from free-form generator output.
//!
//! Collaborator turns may wrap their JSON in markdown fences, surround it with
//! explanatory prose, or emit a bare object where a list was requested. This
//! module recovers a candidate record sequence from such text.
//!
//! # Extraction Strategies
//!
//! After stripping code-fence markers, the following strategies are tried in
//! order until one succeeds:
//! 1. Balanced `[...]` spans, preferring one whose elements are all records
//! 2. The first balanced `{...}` span, wrapped as a one-element sequence
//! 3. The substring from the first `[` to the last `]`
//!
//! Extraction is a pure function of its input. Failure is an expected outcome
//! and is reported as a value, never as an error.
//!
//! # Example
//!
//! ```
//! use lead_forge::utils::json_extraction::extract_records;
//!
//! let turn = "Here you go: [{\"company\": \"Acme\", \"description\": \"d\"}] Thanks!";
//! let records = extract_records(turn).unwrap();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0]["company"], "Acme");
//!
//! assert!(extract_records("Sorry, I cannot comply.").is_none());
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Result of an extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    /// A candidate sequence was recovered.
    Success(Vec<Value>),
    /// Structured output started but never closed, usually a cut-off generation.
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
        unclosed_brackets: usize,
    },
    /// No structured content found.
    NotFound,
}

impl ExtractionResult {
    /// Returns true if a sequence was extracted
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success(_))
    }

    /// Returns true if the text looks like truncated structured output
    pub fn is_truncated(&self) -> bool {
        matches!(self, ExtractionResult::Truncated { .. })
    }

    /// Returns the extracted records for the Success case
    pub fn records(&self) -> Option<&[Value]> {
        match self {
            ExtractionResult::Success(records) => Some(records),
            _ => None,
        }
    }

    pub fn into_records(self) -> Option<Vec<Value>> {
        match self {
            ExtractionResult::Success(records) => Some(records),
            _ => None,
        }
    }

    /// Short label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ExtractionResult::Success(_) => "extracted",
            ExtractionResult::Truncated { .. } => "truncated",
            ExtractionResult::NotFound => "not_found",
        }
    }
}

/// Analysis result for JSON structure
#[derive(Debug, Clone, PartialEq)]
pub struct JsonStructureAnalysis {
    /// Number of unclosed braces ('{' without matching '}')
    pub unclosed_braces: usize,
    /// Number of unclosed brackets ('[' without matching ']')
    pub unclosed_brackets: usize,
    /// Whether we ended inside a string literal
    pub in_string: bool,
    /// The position where JSON-like content starts (first '{' or '[')
    pub json_start: Option<usize>,
}

/// Analyzes JSON structure to determine if content is truncated
///
/// Scans the content and tracks brace/bracket depth to detect incomplete
/// structures.
pub fn analyze_json_structure(s: &str) -> JsonStructureAnalysis {
    let mut brace_depth: isize = 0;
    let mut bracket_depth: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut json_start: Option<usize> = None;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' if json_start.is_some() => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                if json_start.is_none() {
                    json_start = Some(i);
                }
                brace_depth += 1;
            }
            '}' if !in_string => {
                brace_depth -= 1;
            }
            '[' if !in_string => {
                if json_start.is_none() {
                    json_start = Some(i);
                }
                bracket_depth += 1;
            }
            ']' if !in_string => {
                bracket_depth -= 1;
            }
            _ => {}
        }
    }

    JsonStructureAnalysis {
        unclosed_braces: brace_depth.max(0) as usize,
        unclosed_brackets: bracket_depth.max(0) as usize,
        in_string,
        json_start,
    }
}

/// Detects if content appears to contain truncated JSON
///
/// Returns Some((partial, unclosed_braces, unclosed_brackets)) if truncated JSON is detected,
/// None if JSON is complete or no JSON is found.
pub fn detect_truncated_json(content: &str) -> Option<(String, usize, usize)> {
    let trimmed = content.trim();
    let analysis = analyze_json_structure(trimmed);

    let json_start = analysis.json_start?;

    if analysis.unclosed_braces > 0 || analysis.unclosed_brackets > 0 || analysis.in_string {
        let partial_json = trimmed[json_start..].to_string();
        Some((
            partial_json,
            analysis.unclosed_braces,
            analysis.unclosed_brackets,
        ))
    } else {
        None
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```(?:[A-Za-z0-9_+.-]+[ \t]*\r?\n|[ \t]*\r?\n?)")
            .expect("fence pattern is valid")
    })
}

/// Remove markdown code-fence markers (with optional language tag).
///
/// Only the markers are removed; the fenced content stays in place.
pub fn strip_code_fences(text: &str) -> String {
    fence_regex().replace_all(text, "").into_owned()
}

/// Attempts to extract a candidate record sequence with detailed result information.
///
/// Distinguishes between a successful extraction, output that looks truncated,
/// and text with no structured content at all.
pub fn try_extract_records(text: &str) -> ExtractionResult {
    let cleaned = strip_code_fences(text);
    let cleaned = cleaned.trim();

    if let Some(records) = extract_bracketed_sequence(cleaned) {
        return ExtractionResult::Success(records);
    }

    if let Some(record) = extract_first_object(cleaned) {
        return ExtractionResult::Success(vec![record]);
    }

    if let Some(records) = extract_outer_sequence(cleaned) {
        return ExtractionResult::Success(records);
    }

    if let Some((partial_json, unclosed_braces, unclosed_brackets)) =
        detect_truncated_json(cleaned)
    {
        return ExtractionResult::Truncated {
            partial_json,
            unclosed_braces,
            unclosed_brackets,
        };
    }

    ExtractionResult::NotFound
}

/// Extract a candidate record sequence from one turn of free text.
///
/// Returns `None` when no strategy recovers a sequence.
pub fn extract_records(text: &str) -> Option<Vec<Value>> {
    try_extract_records(text).into_records()
}

/// Scan balanced `[...]` spans left to right.
///
/// The first span whose elements are all records wins. Otherwise the first
/// span that parses at all is returned. Spans nested inside an already parsed
/// span are skipped. Every span opens with `[`, so a lone record is left to
/// [`extract_first_object`].
pub fn extract_bracketed_sequence(content: &str) -> Option<Vec<Value>> {
    let mut fallback: Option<Vec<Value>> = None;
    let mut resume_at = 0;

    for (start, c) in content.char_indices() {
        if c != '[' || start < resume_at {
            continue;
        }
        let Some(end) = find_matching_bracket(&content[start..]) else {
            continue;
        };
        let candidate = &content[start..=start + end];
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Array(items)) => {
                if !items.is_empty() && items.iter().all(Value::is_object) {
                    return Some(items);
                }
                if fallback.is_none() {
                    fallback = Some(items);
                }
                resume_at = start + end + 1;
            }
            Ok(_) | Err(_) => {}
        }
    }

    fallback
}

/// Find the first balanced `{...}` span that parses as a record.
pub fn extract_first_object(content: &str) -> Option<Value> {
    for (start, c) in content.char_indices() {
        if c != '{' {
            continue;
        }
        let Some(end) = find_matching_brace(&content[start..]) else {
            continue;
        };
        let candidate = &content[start..=start + end];
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
            return Some(value);
        }
    }
    None
}

/// Parse the substring from the first `[` to the last `]`, inclusive.
pub fn extract_outer_sequence(content: &str) -> Option<Vec<Value>> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&content[start..=end]) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Helper function to find the matching closing brace for a JSON object.
///
/// Handles nested braces, string literals and escape sequences.
/// `s` must start with '{'; returns the index of the matching '}'.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    find_matching(s, '{', '}')
}

/// Helper function to find the matching closing bracket for a JSON array.
///
/// `s` must start with '['; returns the index of the matching ']'.
pub fn find_matching_bracket(s: &str) -> Option<usize> {
    find_matching(s, '[', ']')
}

fn find_matching(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            c if c == open && !in_string => {
                depth += 1;
            }
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
