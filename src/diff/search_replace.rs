//! Tier 2: search/replace blocks, as conflict-marker blocks or JSON.

use crate::diff::errors::FormatError;
use crate::diff::{excerpt, EditSet, SearchReplaceBlock, DEFAULT_EXCERPT_CHARS};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const DIVIDER: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

lazy_static! {
    static ref NOTHING_TO_CHANGE: Regex = Regex::new(
        r"(?i)\b(no\s+(changes?|edits?|modifications?)\b|nothing\s+(needs|to)\s+(be\s+)?chang|already\s+(correct|fine|present|applied|done|up\s+to\s+date)|(is|are|looks)\s+(already\s+)?(correct|fine))"
    )
    .expect("no-change regex");
}

/// Extract search/replace blocks from a response.
///
/// Conflict-marker blocks win when present; otherwise the response is read
/// as JSON, either `{explanation, search_replace_blocks}` or a bare array of
/// blocks.
pub fn extract_search_replace(response: &str) -> Result<EditSet, FormatError> {
    if let Some(set) = marker_blocks(response) {
        return Ok(set);
    }
    json_blocks(response)
}

fn marker_blocks(response: &str) -> Option<EditSet> {
    enum State {
        Outside,
        Search(Vec<String>),
        Replace(Vec<String>, Vec<String>),
    }

    let mut state = State::Outside;
    let mut preface = Vec::new();
    let mut blocks = Vec::new();
    let mut seen_block = false;

    for line in response.lines() {
        let marker = line.trim_end();
        state = match state {
            State::Outside if marker == SEARCH_MARKER => {
                seen_block = true;
                State::Search(Vec::new())
            }
            State::Outside => {
                if !seen_block {
                    preface.push(line);
                }
                State::Outside
            }
            State::Search(search) if marker == DIVIDER => State::Replace(search, Vec::new()),
            State::Search(mut search) => {
                search.push(line.to_string());
                State::Search(search)
            }
            State::Replace(search, replace) if marker == REPLACE_MARKER => {
                let search = search.join("\n");
                if !search.trim().is_empty() {
                    blocks.push(SearchReplaceBlock {
                        search,
                        replace: replace.join("\n"),
                        explanation: None,
                    });
                }
                State::Outside
            }
            State::Replace(search, mut replace) => {
                replace.push(line.to_string());
                State::Replace(search, replace)
            }
        };
    }

    if blocks.is_empty() {
        return None;
    }
    let explanation = preface.join("\n").trim().to_string();
    Some(EditSet::Blocks {
        explanation: (!explanation.is_empty()).then_some(explanation),
        blocks,
    })
}

fn json_blocks(response: &str) -> Result<EditSet, FormatError> {
    let text = strip_fence(response.trim());
    let value = parse_lenient(text)?;

    let (explanation, items) = match value {
        Value::Array(items) => (None, items),
        Value::Object(mut map) => {
            let explanation = match map.remove("explanation") {
                Some(Value::String(s)) => Some(s),
                _ => None,
            };
            match map.remove("search_replace_blocks") {
                Some(Value::Array(items)) => (explanation, items),
                Some(_) => {
                    return Err(FormatError::InvalidJson {
                        message: "search_replace_blocks is not an array".to_string(),
                        excerpt: excerpt(text, DEFAULT_EXCERPT_CHARS),
                    })
                }
                None => {
                    return Err(FormatError::NoBlocks {
                        excerpt: excerpt(text, DEFAULT_EXCERPT_CHARS),
                    })
                }
            }
        }
        _ => {
            return Err(FormatError::InvalidJson {
                message: "expected an object or an array".to_string(),
                excerpt: excerpt(text, DEFAULT_EXCERPT_CHARS),
            })
        }
    };

    if items.is_empty() {
        return match explanation {
            Some(explanation) if !NOTHING_TO_CHANGE.is_match(&explanation) => {
                Err(FormatError::EmptyBlockList { explanation })
            }
            explanation => Ok(EditSet::NoChanges { explanation }),
        };
    }

    let blocks = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| block_from_value(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EditSet::Blocks { explanation, blocks })
}

fn block_from_value(index: usize, item: Value) -> Result<SearchReplaceBlock, FormatError> {
    let Value::Object(mut map) = item else {
        return Err(FormatError::MissingField { index, field: "search" });
    };

    let mut take = |field: &'static str| match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(FormatError::NonStringField { index, field }),
        None => Err(FormatError::MissingField { index, field }),
    };
    let search = take("search")?;
    let replace = take("replace")?;
    let explanation = take("explanation").ok();

    if search.trim().is_empty() {
        return Err(FormatError::EmptySearch { index });
    }
    Ok(SearchReplaceBlock {
        search,
        replace,
        explanation,
    })
}

/// Drop a surrounding ```` ``` ```` fence (with or without a language tag).
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the whole text, then the outermost `{...}` or `[...]` span,
/// whichever opens first.
fn parse_lenient(text: &str) -> Result<Value, FormatError> {
    let first_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| Some((text.find(open)?, text.rfind(close)?)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_unstable();
    for (start, end) in spans {
        if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
            return Ok(value);
        }
    }

    Err(FormatError::InvalidJson {
        message: first_error.to_string(),
        excerpt: excerpt(text, DEFAULT_EXCERPT_CHARS),
    })
}
