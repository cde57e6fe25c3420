//! Unified-diff hunk parsing and application.

use crate::edit::Edit;
use crate::patch::errors::PatchError;
use crate::patch::{closest_line, PatchResult};
use crate::validate::verify_hunk_header;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref HEADER: Regex = Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex");
}

/// `@@ -old_start,old_count +new_start,new_count @@`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

impl HunkHeader {
    pub fn parse(line: &str) -> Option<Self> {
        let caps = HEADER.captures(line)?;
        let number = |i: usize, default: usize| -> Option<usize> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(default),
            }
        };
        Some(Self {
            old_start: number(1, 0)?,
            old_count: number(2, 1)?,
            new_start: number(3, 0)?,
            new_count: number(4, 1)?,
        })
    }
}

impl fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Removed(String),
    Added(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub header: HunkHeader,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Context and removed lines, in order.
    pub fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Removed(text) => Some(text.as_str()),
                HunkLine::Added(_) => None,
            })
            .collect()
    }

    /// Context and added lines, in order.
    pub fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Added(text) => Some(text.as_str()),
                HunkLine::Removed(_) => None,
            })
            .collect()
    }
}

/// Split one diff block into its `@@` hunks.
///
/// File headers (`--- a/x` followed by `+++ b/x`) and any text before the
/// first hunk are skipped. Inside a hunk, an empty line is an empty context
/// line and a line without a marker is a context line as written.
pub fn parse_hunks(diff: &str) -> Result<Vec<Hunk>, PatchError> {
    let lines: Vec<&str> = diff.lines().collect();
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with("--- ") && lines.get(i + 1).is_some_and(|next| next.starts_with("+++ ")) {
            i += 2;
            continue;
        }
        if line.starts_with("@@") {
            let header = HunkHeader::parse(line).ok_or_else(|| PatchError::Malformed {
                message: format!("bad hunk header {line:?}"),
            })?;
            hunks.push(Hunk {
                header,
                lines: Vec::new(),
            });
            i += 1;
            continue;
        }
        if let Some(hunk) = hunks.last_mut() {
            let body = match line.as_bytes().first() {
                Some(b' ') => Some(HunkLine::Context(line[1..].to_string())),
                Some(b'-') => Some(HunkLine::Removed(line[1..].to_string())),
                Some(b'+') => Some(HunkLine::Added(line[1..].to_string())),
                None => Some(HunkLine::Context(String::new())),
                // "\ No newline at end of file"
                Some(b'\\') => None,
                // Models often drop the leading space of context lines.
                Some(_) => Some(HunkLine::Context(line.to_string())),
            };
            hunk.lines.extend(body);
        }
        i += 1;
    }

    // Trailing blank lines are fence padding, not context.
    for hunk in &mut hunks {
        while matches!(hunk.lines.last(), Some(HunkLine::Context(text)) if text.is_empty()) {
            hunk.lines.pop();
        }
    }

    if hunks.is_empty() {
        return Err(PatchError::NoHunks);
    }
    Ok(hunks)
}

/// Byte span of one line: `[start, end)` without the newline, `next` after it.
#[derive(Debug, Clone, Copy)]
struct LineSpan {
    start: usize,
    end: usize,
    next: usize,
}

fn line_spans(text: &str) -> Vec<LineSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    for piece in text.split_inclusive('\n') {
        let next = start + piece.len();
        let content = piece.strip_suffix('\n').unwrap_or(piece);
        let content = content.strip_suffix('\r').unwrap_or(content);
        spans.push(LineSpan {
            start,
            end: start + content.len(),
            next,
        });
        start = next;
    }
    spans
}

/// Every line index where `needle` occurs as consecutive whole lines.
fn find_line_block(text: &str, spans: &[LineSpan], needle: &[&str]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > spans.len() {
        return Vec::new();
    }
    (0..=spans.len() - needle.len())
        .filter(|&i| {
            needle
                .iter()
                .enumerate()
                .all(|(k, expected)| &text[spans[i + k].start..spans[i + k].end] == *expected)
        })
        .collect()
}

/// Apply one hunk to `text` in place.
///
/// The hunk's old lines are located verbatim at line boundaries; among
/// several occurrences the one nearest the declared start line wins. A hunk
/// with no old lines inserts after line `old_start`.
pub fn apply_hunk(text: &mut String, hunk: &Hunk, strict_headers: bool) -> Result<PatchResult, PatchError> {
    let old = hunk.old_lines();
    let new = hunk.new_lines();

    if let Err(mismatch) = verify_hunk_header(&hunk.header, old.len(), new.len()) {
        if strict_headers {
            return Err(mismatch.into());
        }
        tracing::warn!(%mismatch, "locating hunk by content despite header mismatch");
    }

    let spans = line_spans(text);

    if old.is_empty() {
        let offset = match hunk.header.old_start {
            0 => 0,
            n => spans.get(n - 1).map_or(text.len(), |s| s.next),
        };
        let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let mut insert = String::new();
        if offset == text.len() && !text.is_empty() && !text.ends_with('\n') {
            insert.push_str(eol);
        }
        for line in &new {
            insert.push_str(line);
            insert.push_str(eol);
        }
        return Ok(Edit::insertion(offset, insert).apply_to(text)?.into());
    }

    let matches = find_line_block(text, &spans, &old);
    let Some(&first_line) = matches
        .iter()
        .min_by_key(|&&i| (i + 1).abs_diff(hunk.header.old_start))
    else {
        return Err(PatchError::ContextNotFound {
            header: hunk.header.to_string(),
            hint: old.iter().find(|l| !l.trim().is_empty()).and_then(|l| closest_line(text, l)),
        });
    };
    if matches.len() > 1 {
        tracing::debug!(header = %hunk.header, occurrences = matches.len(), chosen = first_line + 1, "ambiguous hunk context");
    }

    let first = spans[first_line];
    let last = spans[first_line + old.len() - 1];
    let had_newline = last.next > last.end;
    let end = if had_newline { last.next } else { last.end };
    let eol = if text[first.end..first.next].starts_with('\r') { "\r\n" } else { "\n" };
    let mut replacement = new.join(eol);
    if had_newline && !new.is_empty() {
        replacement.push_str(eol);
    }

    let edit = Edit::replacing(text, first.start, end, replacement)?;
    Ok(edit.apply_to(text)?.into())
}
