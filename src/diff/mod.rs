//! Extraction of structured edit sets from free-form LLM output.
//!
//! Two grammars are supported, one per escalation tier:
//!
//! 1. **Unified diff** in fenced code blocks ([`extract_unified_diff`])
//! 2. **Search/replace** blocks, as conflict markers or JSON
//!    ([`extract_search_replace`])
//!
//! Both return an [`EditSet`]. "No changes needed" is a successful, empty
//! result and is never confused with a failure to produce changes.

pub mod errors;
pub mod search_replace;
pub mod unified;

pub use errors::FormatError;
pub use search_replace::extract_search_replace;
pub use unified::extract_unified_diff;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response excerpt length used in format errors.
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

/// One fenced unified-diff block, trusted as a unit until application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DiffHunk(String);

impl DiffHunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchReplaceBlock {
    pub search: String,
    pub replace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A validated set of edits in one of the two grammars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditSet {
    Hunks { hunks: Vec<DiffHunk> },
    Blocks {
        explanation: Option<String>,
        blocks: Vec<SearchReplaceBlock>,
    },
    NoChanges { explanation: Option<String> },
}

impl EditSet {
    pub fn is_empty(&self) -> bool {
        match self {
            EditSet::Hunks { hunks } => hunks.is_empty(),
            EditSet::Blocks { blocks, .. } => blocks.is_empty(),
            EditSet::NoChanges { .. } => true,
        }
    }

    /// Number of hunks or blocks.
    pub fn len(&self) -> usize {
        match self {
            EditSet::Hunks { hunks } => hunks.len(),
            EditSet::Blocks { blocks, .. } => blocks.len(),
            EditSet::NoChanges { .. } => 0,
        }
    }
}

/// Output grammar requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    UnifiedDiff,
    SearchReplace,
}

impl Grammar {
    pub fn extract(self, response: &str) -> Result<EditSet, FormatError> {
        match self {
            Grammar::UnifiedDiff => extract_unified_diff(response),
            Grammar::SearchReplace => extract_search_replace(response),
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grammar::UnifiedDiff => write!(f, "unified diff"),
            Grammar::SearchReplace => write!(f, "search/replace"),
        }
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_cuts_on_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé…");
        assert_eq!(excerpt("short", 10), "short");
    }

    #[test]
    fn grammar_dispatch() {
        assert!(matches!(
            Grammar::UnifiedDiff.extract("```diff\n```"),
            Ok(EditSet::NoChanges { .. })
        ));
        assert!(Grammar::SearchReplace.extract("```diff\n```").is_err());
    }
}
