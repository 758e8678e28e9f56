//! Retrieval entries
//!
//! The id map is an ordered list aligned with the vector index: position `i` in the
//! index is described by element `i` of the map. Elements are either structured
//! (`{"summary": ..., "source": ...}`) or a bare string; the shape is resolved here,
//! once, when the file is loaded.

use crate::error::{OceanError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrievedEntry {
    Structured {
        #[serde(default)]
        summary: String,
        /// Table/category the snippet was generated from, e.g. `measurements`
        #[serde(default)]
        source: String,
    },
    Plain(String),
}

impl RetrievedEntry {
    pub fn structured(summary: impl Into<String>, source: impl Into<String>) -> Self {
        RetrievedEntry::Structured {
            summary: summary.into(),
            source: source.into(),
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            RetrievedEntry::Structured { summary, .. } => summary,
            RetrievedEntry::Plain(text) => text,
        }
    }

    /// Source tag; plain entries have none.
    pub fn source(&self) -> &str {
        match self {
            RetrievedEntry::Structured { source, .. } => source,
            RetrievedEntry::Plain(_) => "",
        }
    }

    /// One line of the context block handed to the LLM.
    pub fn context_line(&self) -> String {
        format!("[{}] {}", self.source(), self.summary())
    }
}

/// Ordered mapping from index position to entry
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    entries: Vec<RetrievedEntry>,
}

impl IdMap {
    pub fn new(entries: Vec<RetrievedEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OceanError::Index(format!("Failed to read id map {}: {}", path.display(), e))
        })?;
        let entries: Vec<RetrievedEntry> = serde_json::from_str(&raw).map_err(|e| {
            OceanError::Index(format!("Failed to parse id map {}: {}", path.display(), e))
        })?;
        Ok(Self { entries })
    }

    /// Entry at an index position; out-of-range positions yield `None`.
    pub fn get(&self, position: usize) -> Option<&RetrievedEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[RetrievedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_shapes_resolve_at_load() {
        let raw = r#"[
            {"summary": "Profile 12.0 near 10N 70E", "source": "profiles"},
            "free text note",
            {"summary": "no source here"}
        ]"#;
        let entries: Vec<RetrievedEntry> = serde_json::from_str(raw).unwrap();

        assert_eq!(entries[0], RetrievedEntry::structured("Profile 12.0 near 10N 70E", "profiles"));
        assert_eq!(entries[1], RetrievedEntry::Plain("free text note".to_string()));
        assert_eq!(entries[2].source(), "");
        assert_eq!(entries[0].context_line(), "[profiles] Profile 12.0 near 10N 70E");
        assert_eq!(entries[1].context_line(), "[] free text note");
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_map.json");
        std::fs::write(&path, r#"[{"summary": "a", "source": "measurements"}, "b"]"#).unwrap();

        let map = IdMap::load(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1).map(|e| e.summary()), Some("b"));
        assert!(map.get(2).is_none());
    }

    #[test]
    fn test_missing_file_is_index_error() {
        let err = IdMap::load(Path::new("/nonexistent/id_map.json")).unwrap_err();
        assert!(matches!(err, OceanError::Index(_)));
    }
}
