//! Keyword extraction from a natural-language edit instruction.

use crate::tex::NodeKind;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DELETE_WORDS: Regex = Regex::new(r"(?i)\b(delete|remove|eliminate)\b").expect("delete regex");
    static ref REPLACE_WORDS: Regex =
        Regex::new(r"(?i)\b(replace|change|modify|update|rewrite)\b").expect("replace regex");
    static ref SECTION_REF: Regex = Regex::new(
        r#"(?i)\b(section|subsection|subsubsection|paragraph|subparagraph|chapter)\s+(?:(?:called|named|titled|about|on)\s+)?(?:"([^"]+)"|'([^']+)'|([\w:-]+))"#
    )
    .expect("section reference regex");
    static ref LATEX_COMMAND: Regex = Regex::new(r"\\[A-Za-z]+").expect("command regex");
    static ref DOUBLE_QUOTED: Regex = Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("quote regex");
    static ref SINGLE_QUOTED: Regex = Regex::new(r"(?:^|\s)'([^']+)'(?:\W|$)").expect("single quote regex");
    static ref TOPIC: Regex = Regex::new(
        r#"(?i)\b(?:about|called|named|titled|labeled|labelled|regarding)\s+(?:(?:the|a|an)\s+)?["']?([A-Za-z][\w:-]*)"#
    )
    .expect("topic regex");
    static ref MATH_WORDS: Regex = Regex::new(r"(?i)\b(equations?|math|formulas?)\b").expect("math regex");
    static ref FIGURE_WORDS: Regex = Regex::new(r"(?i)\b(figures?|images?)\b").expect("figure regex");
    static ref TABLE_WORDS: Regex = Regex::new(r"(?i)\b(tables?)\b").expect("table regex");
}

/// Words that follow a section word without naming a section.
const FILLER: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "into", "is", "it", "of", "so", "that",
    "the", "this", "to", "with",
];

/// Kind of edit requested by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditType {
    Insert,
    Replace,
    Delete,
}

impl EditType {
    /// Classify an instruction. Delete words win over replace words; anything
    /// else is an insertion.
    pub fn classify(instruction: &str) -> Self {
        if DELETE_WORDS.is_match(instruction) {
            EditType::Delete
        } else if REPLACE_WORDS.is_match(instruction) {
            EditType::Replace
        } else {
            EditType::Insert
        }
    }
}

/// `section called "Intro"` style reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRef {
    /// Kind named by the section word; `None` for words with no node kind
    /// (`chapter`).
    pub kind: Option<NodeKind>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords {
    pub sections: Vec<SectionRef>,
    pub quoted: Vec<String>,
    pub topics: Vec<String>,
    pub commands: Vec<String>,
    pub injected: Vec<String>,
}

impl Keywords {
    pub fn extract(instruction: &str) -> Self {
        let sections = SECTION_REF
            .captures_iter(instruction)
            .filter_map(|caps| {
                let word = caps.get(1)?.as_str().to_lowercase();
                let (name, quoted) = match (caps.get(2), caps.get(3), caps.get(4)) {
                    (Some(m), _, _) | (_, Some(m), _) => (m.as_str(), true),
                    (_, _, Some(m)) => (m.as_str(), false),
                    _ => return None,
                };
                let name = name.trim();
                if name.is_empty() || (!quoted && FILLER.contains(&name.to_lowercase().as_str())) {
                    return None;
                }
                Some(SectionRef {
                    kind: NodeKind::from_sectioning_command(&word),
                    name: name.to_string(),
                })
            })
            .collect();

        let mut quoted: Vec<String> = DOUBLE_QUOTED
            .captures_iter(instruction)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .collect();
        quoted.extend(
            SINGLE_QUOTED
                .captures_iter(instruction)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string()),
        );
        quoted.retain(|q| !q.is_empty());

        let topics = TOPIC
            .captures_iter(instruction)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|word| !FILLER.contains(&word.to_lowercase().as_str()))
            .collect();

        let commands = LATEX_COMMAND
            .find_iter(instruction)
            .map(|m| m.as_str().to_string())
            .collect();

        let mut injected = Vec::new();
        if MATH_WORDS.is_match(instruction) {
            injected.extend(["equation", "math", "$", "\\begin{equation}"]);
        }
        if FIGURE_WORDS.is_match(instruction) {
            injected.extend(["figure", "\\includegraphics", "\\begin{figure}"]);
        }
        if TABLE_WORDS.is_match(instruction) {
            injected.extend(["table", "\\begin{table}", "\\begin{tabular}"]);
        }

        Self {
            sections,
            quoted,
            topics,
            commands,
            injected: injected.into_iter().map(String::from).collect(),
        }
    }

    /// All keywords in priority order with duplicates removed.
    pub fn ordered(&self) -> Vec<&str> {
        let all = self
            .sections
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.quoted.iter().map(String::as_str))
            .chain(self.topics.iter().map(String::as_str))
            .chain(self.commands.iter().map(String::as_str))
            .chain(self.injected.iter().map(String::as_str));

        let mut seen = Vec::new();
        for keyword in all {
            if !seen.contains(&keyword) {
                seen.push(keyword);
            }
        }
        seen
    }
}
