//! Application of validated edit sets to raw source text.
//!
//! Hunks and blocks are applied in emission order, each against the text
//! left by the ones before it. A failing hunk or block is reported and
//! skipped; it never aborts its siblings. Every change goes through a
//! verified [`Edit`](crate::Edit).

pub mod blocks;
pub mod errors;
pub mod hunk;

pub use blocks::apply_block;
pub use errors::{LineHint, PatchError};
pub use hunk::{apply_hunk, parse_hunks, Hunk, HunkHeader, HunkLine};

use crate::config::PatchSettings;
use crate::diff::{DiffHunk, EditSet, SearchReplaceBlock};
use crate::edit::EditResult;
use std::fmt;

/// Minimum normalized similarity for a closest-line hint.
const HINT_THRESHOLD: f64 = 0.5;

/// Result of applying a single hunk or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for success/failure"]
pub enum PatchResult {
    Applied,
    /// The located span already equals its replacement
    AlreadyApplied,
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied => write!(f, "applied"),
            PatchResult::AlreadyApplied => write!(f, "already applied"),
        }
    }
}

impl From<EditResult> for PatchResult {
    fn from(result: EditResult) -> Self {
        match result {
            EditResult::Applied { .. } => PatchResult::Applied,
            EditResult::AlreadyApplied => PatchResult::AlreadyApplied,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOptions {
    pub strict_hunk_headers: bool,
}

impl From<&PatchSettings> for PatchOptions {
    fn from(settings: &PatchSettings) -> Self {
        Self {
            strict_hunk_headers: settings.strict_hunk_headers,
        }
    }
}

/// The patched text and one labelled result per hunk or block.
#[derive(Debug)]
pub struct PatchReport {
    pub text: String,
    pub results: Vec<(String, Result<PatchResult, PatchError>)>,
}

impl PatchReport {
    /// Number of hunks or blocks that changed the text.
    pub fn applied(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, Ok(PatchResult::Applied)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PatchError)> {
        self.results
            .iter()
            .filter_map(|(label, r)| r.as_ref().err().map(|e| (label.as_str(), e)))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Apply any edit set. "No changes" returns the source untouched.
pub fn apply_edit_set(source: &str, edits: &EditSet, options: &PatchOptions) -> PatchReport {
    match edits {
        EditSet::Hunks { hunks } => apply_hunks(source, hunks, options),
        EditSet::Blocks { blocks, .. } => apply_blocks(source, blocks),
        EditSet::NoChanges { .. } => PatchReport {
            text: source.to_string(),
            results: Vec::new(),
        },
    }
}

/// Apply diff blocks in order. Results are labelled `diff N` for a block
/// that does not parse and `diff N hunk M` otherwise (both 1-based).
pub fn apply_hunks(source: &str, diffs: &[DiffHunk], options: &PatchOptions) -> PatchReport {
    let mut text = source.to_string();
    let mut results = Vec::new();

    for (d, diff) in diffs.iter().enumerate() {
        let hunks = match parse_hunks(diff.as_str()) {
            Ok(hunks) => hunks,
            Err(error) => {
                tracing::warn!(diff = d + 1, %error, "skipping unparseable diff");
                results.push((format!("diff {}", d + 1), Err(error)));
                continue;
            }
        };
        for (h, hunk) in hunks.iter().enumerate() {
            let label = format!("diff {} hunk {}", d + 1, h + 1);
            let result = apply_hunk(&mut text, hunk, options.strict_hunk_headers);
            if let Err(error) = &result {
                tracing::warn!(%label, %error, "hunk failed");
            }
            results.push((label, result));
        }
    }

    PatchReport { text, results }
}

/// Apply search/replace blocks in order, labelled `block N` (1-based).
pub fn apply_blocks(source: &str, blocks: &[SearchReplaceBlock]) -> PatchReport {
    let mut text = source.to_string();
    let mut results = Vec::with_capacity(blocks.len());

    for (i, block) in blocks.iter().enumerate() {
        let label = format!("block {}", i + 1);
        let result = apply_block(&mut text, i + 1, block);
        if let Err(error) = &result {
            tracing::warn!(%label, %error, "block failed");
        }
        results.push((label, result));
    }

    PatchReport { text, results }
}

/// The line of `text` most similar to `needle`, if any is similar enough.
pub(crate) fn closest_line(text: &str, needle: &str) -> Option<LineHint> {
    let needle = needle.trim();
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i, line, strsim::normalized_levenshtein(line.trim(), needle)))
        .filter(|(_, _, similarity)| *similarity >= HINT_THRESHOLD)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(i, line, similarity)| LineHint {
            line: i + 1,
            text: line.trim().to_string(),
            similarity,
        })
}
