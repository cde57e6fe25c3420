//! Tier 1: unified diffs in fenced code blocks.

use crate::diff::errors::FormatError;
use crate::diff::{excerpt, DiffHunk, EditSet};
use lazy_static::lazy_static;
use regex::Regex;

const MARKERS: [&str; 3] = ["@@", "--- ", "+++ "];

lazy_static! {
    static ref EMPTY_FENCE: Regex = Regex::new(r"^```(?:diff)?\s*```$").expect("empty fence regex");
}

/// Extract unified-diff hunks from a response.
///
/// An empty response or an empty fence means "no changes". Fenced blocks
/// tagged `diff`, `patch` or nothing are accepted when they carry all three
/// diff markers; if none does, the whole response is tried as one unfenced
/// diff.
pub fn extract_unified_diff(response: &str) -> Result<EditSet, FormatError> {
    let trimmed = response.trim();
    if trimmed.is_empty() || EMPTY_FENCE.is_match(trimmed) {
        return Ok(EditSet::NoChanges { explanation: None });
    }

    let mut hunks = Vec::new();
    let mut first_rejection = None;
    let diff_blocks = fenced_blocks(trimmed)
        .into_iter()
        .filter(|(info, _)| matches!(*info, "" | "diff" | "patch"));
    for (index, (_, body)) in diff_blocks.enumerate() {
        let body = body.trim();
        match missing_marker(body) {
            None => hunks.push(DiffHunk::new(body)),
            Some(marker) => {
                tracing::debug!(index, marker, "rejecting diff block");
                first_rejection.get_or_insert(FormatError::MissingMarker {
                    index,
                    marker,
                    excerpt: excerpt(body, super::DEFAULT_EXCERPT_CHARS),
                });
            }
        }
    }

    if !hunks.is_empty() {
        return Ok(EditSet::Hunks { hunks });
    }

    if missing_marker(trimmed).is_none() && has_change_line(trimmed) {
        return Ok(EditSet::Hunks {
            hunks: vec![DiffHunk::new(trimmed)],
        });
    }

    Err(first_rejection.unwrap_or_else(|| FormatError::NoDiffBlocks {
        excerpt: excerpt(trimmed, super::DEFAULT_EXCERPT_CHARS),
    }))
}

/// Fenced code blocks as `(info string, body)`.
///
/// Fence lines are paired in order: a line starting with three backticks
/// opens a block, and the next bare fence line closes it. An unclosed block
/// at the end is dropped.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut open: Option<(&str, usize)> = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let Some(info) = line.trim().strip_prefix("```") else {
            continue;
        };
        let info = info.trim();
        match open {
            None => open = Some((info, offset)),
            Some((tag, body_start)) if info.is_empty() => {
                blocks.push((tag, &text[body_start..line_start]));
                open = None;
            }
            Some(_) => {}
        }
    }
    blocks
}

fn missing_marker(text: &str) -> Option<&'static str> {
    MARKERS.into_iter().find(|marker| !text.contains(marker))
}

fn has_change_line(text: &str) -> bool {
    text.lines().any(|line| {
        (line.starts_with('+') && !line.starts_with("+++")) || (line.starts_with('-') && !line.starts_with("---"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HUNK_A: &str = "--- a/main.tex\n+++ b/main.tex\n@@ -1,1 +1,1 @@\n-old\n+new";
    const HUNK_B: &str = "--- a/main.tex\n+++ b/main.tex\n@@ -5,1 +5,1 @@\n-x\n+y";

    #[test]
    fn empty_fences_mean_no_changes() {
        for response in ["", "  \n", "```diff\n```", "```\n```", "``` ```", "```diff\n\n  ```"] {
            assert_eq!(
                extract_unified_diff(response),
                Ok(EditSet::NoChanges { explanation: None }),
                "{response:?}"
            );
        }
    }

    #[test]
    fn two_fenced_blocks_in_order() {
        let response = format!("First:\n```diff\n{HUNK_A}\n```\nThen:\n```diff\n{HUNK_B}\n```\n");
        let Ok(EditSet::Hunks { hunks }) = extract_unified_diff(&response) else {
            panic!("expected hunks");
        };
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].as_str(), HUNK_A);
        assert_eq!(hunks[1].as_str(), HUNK_B);
    }

    #[test]
    fn closing_fence_of_other_language_does_not_open_a_diff() {
        let response = format!("New text:\n```latex\n\\section{{A}}\n```\nPatch:\n```diff\n{HUNK_A}\n```\nDone.");
        let Ok(EditSet::Hunks { hunks }) = extract_unified_diff(&response) else {
            panic!("expected hunks");
        };
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].as_str(), HUNK_A);
    }

    #[test]
    fn untagged_and_patch_fences_are_accepted() {
        let response = format!("```\n{HUNK_A}\n```\n```patch\n{HUNK_B}\n```");
        let Ok(EditSet::Hunks { hunks }) = extract_unified_diff(&response) else {
            panic!("expected hunks");
        };
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].as_str(), HUNK_B);
    }

    #[test]
    fn block_without_new_file_header_is_rejected() {
        let response = "```diff\n--- a/main.tex\n@@ -1 +1 @@\n-old\n+new\n```";
        assert!(matches!(
            extract_unified_diff(response),
            Err(FormatError::MissingMarker { marker: "+++ ", .. })
        ));
    }

    #[test]
    fn unfenced_diff_is_accepted_whole() {
        let response = format!("{HUNK_A}\n");
        let Ok(EditSet::Hunks { hunks }) = extract_unified_diff(&response) else {
            panic!("expected hunks");
        };
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].as_str(), HUNK_A);
    }

    #[test]
    fn prose_is_a_format_failure() {
        assert!(matches!(
            extract_unified_diff("I think the section is fine as is."),
            Err(FormatError::NoDiffBlocks { .. })
        ));
    }

    #[test]
    fn markers_without_change_lines_are_not_a_diff() {
        let response = "The @@ markers and --- and +++ appear in prose only.";
        assert!(extract_unified_diff(response).is_err());
    }
}
