//! Validation checks run before a patch is allowed to touch the source.
//!
//! # Hard Rules (Never Violate)
//!
//! 1. **Selector uniqueness**: a search string that matches 0 or >1
//!    locations is refused. No guessing.
//! 2. **Header agreement**: a hunk whose `@@` counts disagree with its body
//!    is reported; in strict mode it is refused.

use crate::patch::hunk::HunkHeader;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("selector matched {count} locations, expected exactly 1")]
    SelectorNotUnique { count: usize, pattern: String },

    #[error("selector matched 0 locations")]
    NoMatch { pattern: String },

    #[error(
        "hunk header {header} declares {declared_old} old / {declared_new} new lines, body has {counted_old} / {counted_new}"
    )]
    HunkHeaderMismatch {
        header: String,
        declared_old: usize,
        declared_new: usize,
        counted_old: usize,
        counted_new: usize,
    },
}

/// Selector uniqueness checker.
pub struct SelectorValidator;

impl SelectorValidator {
    /// Check that a pattern match count is exactly 1.
    pub fn check_unique(count: usize, pattern: &str) -> Result<(), ValidationError> {
        match count {
            0 => Err(ValidationError::NoMatch {
                pattern: pattern.to_string(),
            }),
            1 => Ok(()),
            n => Err(ValidationError::SelectorNotUnique {
                count: n,
                pattern: pattern.to_string(),
            }),
        }
    }
}

/// Compare a hunk header's declared line counts with the counted body.
///
/// `old_lines` is context plus removed lines, `new_lines` context plus
/// added lines.
pub fn verify_hunk_header(header: &HunkHeader, old_lines: usize, new_lines: usize) -> Result<(), ValidationError> {
    if header.old_count == old_lines && header.new_count == new_lines {
        return Ok(());
    }
    Err(ValidationError::HunkHeaderMismatch {
        header: header.to_string(),
        declared_old: header.old_count,
        declared_new: header.new_count,
        counted_old: old_lines,
        counted_new: new_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_uniqueness() {
        assert!(SelectorValidator::check_unique(1, "x").is_ok());
        assert!(matches!(
            SelectorValidator::check_unique(0, "x"),
            Err(ValidationError::NoMatch { .. })
        ));
        assert!(matches!(
            SelectorValidator::check_unique(3, "x"),
            Err(ValidationError::SelectorNotUnique { count: 3, .. })
        ));
    }

    #[test]
    fn test_header_counts() {
        let header = HunkHeader {
            old_start: 3,
            old_count: 2,
            new_start: 3,
            new_count: 3,
        };
        assert!(verify_hunk_header(&header, 2, 3).is_ok());
        let err = verify_hunk_header(&header, 2, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "hunk header @@ -3,2 +3,3 @@ declares 2 old / 3 new lines, body has 2 / 2"
        );
    }
}
