//! Time-cast rewriter
//!
//! The Argo loader sometimes stores `profiles.time` as text or epoch numbers while the
//! LLM writes SQL assuming a TIMESTAMP. When the declared type is neither a timestamp
//! nor a date, date-part extraction arguments are wrapped in an explicit cast.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Table and column whose declared type drives the rewrite
pub const TIME_TABLE: &str = "profiles";
pub const TIME_COLUMN: &str = "time";

lazy_static! {
    static ref EXTRACT_MONTH: Regex = Regex::new(r"(?i)EXTRACT\s*\(\s*MONTH\s+FROM\s+([^)]+)\)").unwrap();
    static ref EXTRACT_YEAR: Regex = Regex::new(r"(?i)EXTRACT\s*\(\s*YEAR\s+FROM\s+([^)]+)\)").unwrap();
    static ref MONTH_FN: Regex = Regex::new(r"(?i)\bMONTH\s*\(\s*([^)]+)\s*\)").unwrap();
    static ref YEAR_FN: Regex = Regex::new(r"(?i)\bYEAR\s*\(\s*([^)]+)\s*\)").unwrap();
    static ref ALREADY_CAST: Regex = Regex::new(r"(?i)^\s*(TRY_)?CAST\b").unwrap();
}

/// Whether a declared column type needs the explicit cast.
///
/// `None` or an empty string means the lookup failed; that never triggers a rewrite.
pub fn needs_time_cast(column_type: Option<&str>) -> bool {
    match column_type.map(|t| t.trim().to_lowercase()) {
        Some(t) if !t.is_empty() => !t.contains("timestamp") && !t.contains("date"),
        _ => false,
    }
}

/// Rewrite date-part extraction for a column of the given declared type.
pub fn rewrite_time_extraction(sql: &str, column_type: Option<&str>) -> String {
    if !needs_time_cast(column_type) {
        return sql.to_string();
    }

    let patterns: [(&Regex, &str); 4] = [
        (&EXTRACT_MONTH, "MONTH"),
        (&EXTRACT_YEAR, "YEAR"),
        (&MONTH_FN, "MONTH"),
        (&YEAR_FN, "YEAR"),
    ];

    patterns.iter().fold(sql.to_string(), |acc, (pattern, part)| {
        pattern
            .replace_all(&acc, |caps: &Captures| {
                let expr = caps[1].trim();
                if ALREADY_CAST.is_match(expr) {
                    caps[0].to_string()
                } else {
                    format!("EXTRACT({} FROM CAST({} AS TIMESTAMP))", part, expr)
                }
            })
            .into_owned()
    })
}
