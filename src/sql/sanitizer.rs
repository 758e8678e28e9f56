//! SQL Sanitizer
//!
//! Turns free-form LLM output into a single statement. Extraction is an ordered list
//! of strategies tried until one matches; afterwards a fixed list of textual repair
//! rules is applied. Both lists are public so they can be inspected and tested one
//! by one. None of this parses SQL; the result may still be invalid.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").unwrap();
    static ref SELECT_TERMINATED: Regex = Regex::new(r"(?is)(SELECT\b.*?;)").unwrap();
    static ref SELECT_ONWARD: Regex = Regex::new(r"(?is)SELECT\b.*").unwrap();
    static ref PREAMBLE: Regex = Regex::new(r"(?i)^[\s\w\-:.]*?(SELECT\b)").unwrap();
    static ref CAST_MISSING_OPEN_PAREN: Regex = Regex::new(r"(?i)CAST\s*([^ (]+)\.").unwrap();
    static ref CAST_MISSING_CLOSE_PAREN: Regex = Regex::new(r"(?i)CAST\s*([^ (]+)\s+AS").unwrap();
}

/// A way of locating the statement inside the raw response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Contents of a ``` fence, optionally tagged `sql`
    FencedBlock,
    /// `SELECT` up to and including the first `;`
    SelectTerminated,
    /// `SELECT` to the end of the text
    SelectOnward,
    /// The whole response
    RawText,
}

pub const EXTRACTION_ORDER: &[ExtractionStrategy] = &[
    ExtractionStrategy::FencedBlock,
    ExtractionStrategy::SelectTerminated,
    ExtractionStrategy::SelectOnward,
    ExtractionStrategy::RawText,
];

impl ExtractionStrategy {
    pub fn extract(&self, text: &str) -> Option<String> {
        match self {
            ExtractionStrategy::FencedBlock => FENCED_BLOCK
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string()),
            ExtractionStrategy::SelectTerminated => SELECT_TERMINATED
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string()),
            ExtractionStrategy::SelectOnward => SELECT_ONWARD
                .find(text)
                .map(|m| m.as_str().trim().to_string()),
            ExtractionStrategy::RawText => Some(text.trim().to_string()),
        }
    }
}

/// Textual fix for a known malformed `CAST` shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairRule {
    /// `CAST profiles.time` -> `CAST(profiles.time`
    CastMissingOpenParen,
    /// `CAST x AS` -> `CAST(x) AS`
    CastMissingCloseParen,
}

pub const REPAIR_RULES: &[RepairRule] = &[
    RepairRule::CastMissingOpenParen,
    RepairRule::CastMissingCloseParen,
];

impl RepairRule {
    pub fn apply(&self, sql: &str) -> String {
        match self {
            RepairRule::CastMissingOpenParen => CAST_MISSING_OPEN_PAREN
                .replace_all(sql, "CAST(${1}.")
                .into_owned(),
            RepairRule::CastMissingCloseParen => CAST_MISSING_CLOSE_PAREN
                .replace_all(sql, "CAST(${1}) AS")
                .into_owned(),
        }
    }
}

/// Run the extraction strategies in order; the first hit wins.
pub fn extract_statement(text: &str) -> (ExtractionStrategy, String) {
    for strategy in EXTRACTION_ORDER {
        if let Some(sql) = strategy.extract(text) {
            return (*strategy, sql);
        }
    }
    // RawText always matches
    (ExtractionStrategy::RawText, text.trim().to_string())
}

/// Drop leading words/punctuation such as `Query:` or `Here is the SQL -` before `SELECT`.
pub fn strip_preamble(sql: &str) -> String {
    PREAMBLE.replace(sql, "${1}").into_owned()
}

pub fn apply_repairs(sql: &str) -> String {
    REPAIR_RULES
        .iter()
        .fold(sql.to_string(), |acc, rule| rule.apply(&acc))
}

/// Extract, strip and repair in one go.
pub fn sanitize(raw_llm_text: &str) -> String {
    let (strategy, sql) = extract_statement(raw_llm_text);
    tracing::debug!("SQL extracted with {:?}", strategy);
    apply_repairs(&strip_preamble(&sql))
}
