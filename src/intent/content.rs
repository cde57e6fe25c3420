//! Pull the LaTeX payload out of an LLM suggestion.

use crate::tex::diagnostics::Diagnostics;
use crate::tex::scan;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LATEX_FENCE: Regex = Regex::new(r"(?s)```(?:latex|tex)[ \t]*\r?\n(.*?)```").expect("fence regex");
    static ref DISPLAY_MATH: Regex = Regex::new(r"(?s)\$\$(.+?)\$\$").expect("display math regex");
    static ref INLINE_MATH: Regex = Regex::new(r"\$([^$\n]+)\$").expect("inline math regex");
    static ref HEADER: Regex = Regex::new(r"(?m)^#{1,6}[ \t]+").expect("header regex");
    static ref BOLD_STARS: Regex = Regex::new(r"\*\*(.+?)\*\*").expect("bold regex");
    static ref BOLD_UNDERSCORES: Regex = Regex::new(r"\b__(.+?)__\b").expect("bold regex");
    static ref ITALIC: Regex = Regex::new(r"\*([^*\s][^*]*?)\*").expect("italic regex");
    static ref LINK: Regex = Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("link regex");
}

/// Extract the content to insert or substitute, first rule wins:
/// a fenced `latex` block, a math span's inner text, a full environment
/// block, or the whole suggestion with markdown decoration removed.
pub fn extract_content(suggestion: &str) -> String {
    if let Some(caps) = LATEX_FENCE.captures(suggestion) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = DISPLAY_MATH.captures(suggestion) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = INLINE_MATH.captures(suggestion) {
        return caps[1].trim().to_string();
    }
    if let Some(block) = environment_block(suggestion) {
        return block.to_string();
    }
    strip_markdown(suggestion)
}

/// The first complete `\begin{X} ... \end{X}` block.
fn environment_block(text: &str) -> Option<&str> {
    let mut diagnostics = Diagnostics::new();
    let pairs = scan::match_environments(scan::environment_tokens(text, 0, text.len()), &mut diagnostics);
    pairs.first().map(|pair| &text[pair.start..pair.end])
}

/// Remove markdown headers, bold, italics and links. Underscores inside
/// words are LaTeX subscripts and stay.
pub fn strip_markdown(text: &str) -> String {
    let text = HEADER.replace_all(text, "");
    let text = BOLD_STARS.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    text.trim().to_string()
}
