use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Hunks, search/replace blocks and resolved intents all compile down to
/// this single primitive, applied to an in-memory source string.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply_to() is called"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("invalid byte range [{byte_start}, {byte_end}) in source of length {source_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        source_len: usize,
    },

    #[error("byte range [{byte_start}, {byte_end}) does not fall on character boundaries")]
    NotCharBoundary { byte_start: usize, byte_end: usize },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    Applied { bytes_changed: usize },
    /// Current text already equals `new_text`
    AlreadyApplied,
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// Build an edit replacing `[byte_start, byte_end)` of `source`, taking the
    /// expected before-text from `source` itself.
    pub fn replacing(source: &str, byte_start: usize, byte_end: usize, new_text: impl Into<String>) -> Result<Self, EditError> {
        let current = span(source, byte_start, byte_end)?;
        Ok(Self::new(byte_start, byte_end, new_text, current))
    }

    /// Pure insertion at `offset`.
    pub fn insertion(offset: usize, new_text: impl Into<String>) -> Self {
        Self::new(offset, offset, new_text, "")
    }

    /// Check the edit against `source`, returning the text it would replace.
    fn validate<'s>(&self, source: &'s str) -> Result<&'s str, EditError> {
        let current = span(source, self.byte_start, self.byte_end)?;

        // Already applied: accept regardless of the before-text.
        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current.to_string(),
            });
        }
        Ok(current)
    }

    /// Apply this edit to `source` in place.
    pub fn apply_to(&self, source: &mut String) -> Result<EditResult, EditError> {
        let current = self.validate(source)?;
        if current == self.new_text {
            return Ok(EditResult::AlreadyApplied);
        }
        source.replace_range(self.byte_start..self.byte_end, &self.new_text);
        Ok(EditResult::Applied {
            bytes_changed: self.new_text.len(),
        })
    }
}

fn span(source: &str, byte_start: usize, byte_end: usize) -> Result<&str, EditError> {
    if byte_start > byte_end || byte_end > source.len() {
        return Err(EditError::InvalidByteRange {
            byte_start,
            byte_end,
            source_len: source.len(),
        });
    }
    source
        .get(byte_start..byte_end)
        .ok_or(EditError::NotCharBoundary { byte_start, byte_end })
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file is left untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // Same directory keeps the rename on one filesystem.
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("\\section{A}".to_string());
        assert!(verify.matches("\\section{A}"));
        assert!(!verify.matches("\\section{B}"));
    }

    #[test]
    fn test_edit_verification_uses_hash_for_large_spans() {
        assert!(matches!(EditVerification::from_text("small"), EditVerification::ExactMatch(_)));
        let large = "x".repeat(2000);
        let verify = EditVerification::from_text(&large);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert!(verify.matches(&large));
        assert!(!verify.matches("y"));
    }

    #[test]
    fn test_apply_replaces_span() {
        let mut source = "E = mc^2".to_string();
        let edit = Edit::replacing(&source, 4, 8, "m c^2").unwrap();
        assert_eq!(edit.apply_to(&mut source).unwrap(), EditResult::Applied { bytes_changed: 5 });
        assert_eq!(source, "E = m c^2");
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut source = "hello world".to_string();
        let edit = Edit::new(0, 5, "hello", "HELLO");
        assert_eq!(edit.apply_to(&mut source).unwrap(), EditResult::AlreadyApplied);
        assert_eq!(source, "hello world");
    }

    #[test]
    fn test_mismatch_and_bad_ranges() {
        let mut source = "hello world".to_string();
        let edit = Edit::new(0, 5, "bye", "howdy");
        assert!(matches!(edit.apply_to(&mut source), Err(EditError::BeforeTextMismatch { .. })));

        let edit = Edit::new(5, 20, "x", "");
        assert!(matches!(edit.apply_to(&mut source), Err(EditError::InvalidByteRange { .. })));

        let edit = Edit::new(10, 5, "x", "");
        assert!(matches!(edit.apply_to(&mut source), Err(EditError::InvalidByteRange { .. })));

        let mut accented = "é".to_string();
        let edit = Edit::new(0, 1, "e", "");
        assert!(matches!(edit.apply_to(&mut accented), Err(EditError::NotCharBoundary { .. })));
    }

    #[test]
    fn test_atomic_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.tex");
        std::fs::write(&path, "old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
