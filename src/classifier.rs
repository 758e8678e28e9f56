//! Query Classification
//!
//! Decides whether a question asks for specific measured data or is purely
//! informational. Plain substring membership on the lowercased query: any
//! keyword hit sends the query down the data path, so mixed phrasing
//! ("what is an average ocean?") is always treated as a data request.

use serde::{Deserialize, Serialize};

/// Terms that signal a request for specific data
pub const DATA_KEYWORDS: &[&str] = &[
    "salinity", "temperature", "temp", "depth", "pressure", "trend", "average", "min", "max",
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "2018", "2019", "2020", "2021", "2022", "2023",
    "2024", "2025", "profile", "latitude", "longitude", "platform",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Informational question answered from general knowledge
    Generic,
    /// Question about the dataset; goes through retrieval and SQL
    DataSpecific,
}

pub fn classify(query: &str) -> QueryKind {
    let lowered = query.to_lowercase();
    if DATA_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        QueryKind::DataSpecific
    } else {
        QueryKind::Generic
    }
}

/// Keyword that triggered the data path, if any.
pub fn matched_keyword(query: &str) -> Option<&'static str> {
    let lowered = query.to_lowercase();
    DATA_KEYWORDS.iter().copied().find(|keyword| lowered.contains(keyword))
}
