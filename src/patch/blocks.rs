use crate::diff::SearchReplaceBlock;
use crate::edit::Edit;
use crate::patch::errors::PatchError;
use crate::patch::{closest_line, PatchResult};
use crate::validate::{SelectorValidator, ValidationError};

/// Apply one search/replace block to `text` in place.
///
/// `index` is the block's position in its response and only labels errors.
pub fn apply_block(text: &mut String, index: usize, block: &SearchReplaceBlock) -> Result<PatchResult, PatchError> {
    let positions = occurrences(text, &block.search);

    if let Err(source) = SelectorValidator::check_unique(positions.len(), &block.search) {
        let hint = match source {
            ValidationError::NoMatch { .. } => block
                .search
                .lines()
                .find(|l| !l.trim().is_empty())
                .and_then(|l| closest_line(text, l)),
            _ => None,
        };
        return Err(PatchError::Search { index, source, hint });
    }

    let start = positions[0];
    let edit = Edit::replacing(text, start, start + block.search.len(), block.replace.clone())?;
    Ok(edit.apply_to(text)?.into())
}

/// Start offsets of every occurrence of `needle`, overlapping ones included.
fn occurrences(text: &str, needle: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    if needle.is_empty() {
        return positions;
    }
    let mut from = 0;
    while let Some(found) = text[from..].find(needle) {
        let at = from + found;
        positions.push(at);
        // Step one character so overlapping occurrences are counted.
        from = at + text[at..].chars().next().map_or(1, char::len_utf8);
    }
    positions
}
