use crate::edit::EditError;
use crate::validate::ValidationError;
use std::fmt;
use thiserror::Error;

/// Closest line of the current text to something that failed to match.
#[derive(Debug, Clone, PartialEq)]
pub struct LineHint {
    /// 1-based
    pub line: usize,
    pub text: String,
    pub similarity: f64,
}

impl fmt::Display for LineHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closest line {}: {:?}", self.line, self.text)
    }
}

fn hint_suffix(hint: &Option<LineHint>) -> String {
    hint.as_ref().map(|h| format!(" ({h})")).unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("malformed diff: {message}")]
    Malformed { message: String },

    #[error("diff contains no @@ hunks")]
    NoHunks,

    #[error("hunk {header}: context not found{}", hint_suffix(.hint))]
    ContextNotFound { header: String, hint: Option<LineHint> },

    #[error("search block {index}: {source}{}", hint_suffix(.hint))]
    Search {
        index: usize,
        #[source]
        source: ValidationError,
        hint: Option<LineHint>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Edit(#[from] EditError),
}
