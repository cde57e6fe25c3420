//! Edit intent resolution: from a natural-language instruction and an LLM
//! suggestion to a concrete edit against the parsed tree.

pub mod content;
pub mod keywords;
pub mod resolver;

pub use content::{extract_content, strip_markdown};
pub use keywords::{EditType, Keywords, SectionRef};
pub use resolver::{candidates, resolve, Candidate, Strategy};

use crate::edit::Edit;
use crate::tex::NodeRef;

/// A resolved edit, borrowing its target from the parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct EditIntent<'a> {
    pub edit_type: EditType,
    pub target: NodeRef<'a>,
    pub content: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl EditIntent<'_> {
    /// Lower the intent to a byte-span [`Edit`] on the document source.
    ///
    /// Replace swaps the target span for the content, Delete empties it, and
    /// Insert places the content on its own line right after the target.
    pub fn to_edit(&self) -> Edit {
        let start = self.target.start();
        let end = self.target.end();
        let before = self.target.content();
        match self.edit_type {
            EditType::Replace => Edit::new(start, end, self.content.clone(), before),
            EditType::Delete => Edit::new(start, end, "", before),
            EditType::Insert => {
                let source = self.target.document().source();
                let mut text = String::with_capacity(self.content.len() + 2);
                if end > 0 && !source[..end].ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&self.content);
                if !self.content.ends_with('\n') {
                    text.push('\n');
                }
                Edit::insertion(end, text)
            }
        }
    }
}
