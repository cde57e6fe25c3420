//! Candidate generation and selection for edit targets.

use crate::intent::content::extract_content;
use crate::intent::keywords::{EditType, Keywords};
use crate::intent::EditIntent;
use crate::tex::{find_by_content, find_by_kind, find_by_name, Document, NodeKind, NodeRef};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

pub const EXACT_CONTENT_SCORE: f64 = 0.95;
pub const SECTION_NAME_SCORE: f64 = 0.8;
pub const ENVIRONMENT_SCORE: f64 = 0.75;
pub const KEYWORD_SCORE: f64 = 0.7;
pub const KEYWORD_STEP: f64 = 0.05;
pub const KEYWORD_FLOOR: f64 = 0.1;
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const MIN_KEYWORD_LEN: usize = 3;
const MIN_QUOTE_LEN: usize = 10;
const MATCHES_PER_KEYWORD: usize = 3;
const EQUATIONS_FROM_MATH: usize = 2;

lazy_static! {
    static ref SUGGESTION_QUOTE: Regex = Regex::new(r#""([^"\n]+)"|`([^`\n]+)`"#).expect("quote regex");
    static ref BEGIN_ENV: Regex = Regex::new(r"\\begin\{([^}]+)\}").expect("begin regex");
    static ref MATH_DELIMITER: Regex = Regex::new(r"\$|\\\(|\\\[").expect("math delimiter regex");
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ExactContent,
    SectionName,
    Keyword,
    Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub node: NodeRef<'a>,
    pub score: f64,
    pub strategy: Strategy,
}

/// Resolve an instruction and suggestion against a parsed document. Never
/// fails: without any candidate the Body (or Root) is targeted with
/// confidence 0.5.
pub fn resolve<'a>(doc: &'a Document, instruction: &str, suggestion: &str) -> EditIntent<'a> {
    let edit_type = EditType::classify(instruction);
    let content = extract_content(suggestion);
    let candidates = candidates(doc, instruction, suggestion);

    let (target, confidence) = match candidates.first() {
        Some(best) => (best.node, best.score),
        None => (doc.body().unwrap_or_else(|| doc.root()), FALLBACK_CONFIDENCE),
    };
    tracing::debug!(
        ?edit_type,
        kind = %target.kind(),
        name = target.name().unwrap_or(""),
        confidence,
        candidates = candidates.len(),
        "resolved edit target"
    );

    EditIntent {
        edit_type,
        target,
        content,
        confidence,
    }
}

/// All scored candidates, best first, one per node.
pub fn candidates<'a>(doc: &'a Document, instruction: &str, suggestion: &str) -> Vec<Candidate<'a>> {
    let keywords = Keywords::extract(instruction);
    let root = doc.root();

    let mut found = Vec::new();
    exact_content(root, suggestion, &mut found);
    section_names(doc, &keywords, &mut found);
    keyword_matches(root, &keywords, &mut found);
    environment_types(root, suggestion, &mut found);

    // Stable: equal scores keep strategy order.
    found.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut unique: Vec<Candidate<'a>> = Vec::with_capacity(found.len());
    for candidate in found {
        if !unique.iter().any(|c| c.node == candidate.node) {
            unique.push(candidate);
        }
    }
    unique
}

fn exact_content<'a>(root: NodeRef<'a>, suggestion: &str, out: &mut Vec<Candidate<'a>>) {
    for caps in SUGGESTION_QUOTE.captures_iter(suggestion) {
        let Some(phrase) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let phrase = phrase.as_str();
        if phrase.len() < MIN_QUOTE_LEN {
            continue;
        }
        for node in anchor(find_by_content(root, phrase)) {
            out.push(Candidate {
                node,
                score: EXACT_CONTENT_SCORE,
                strategy: Strategy::ExactContent,
            });
        }
    }
}

fn section_names<'a>(doc: &'a Document, keywords: &Keywords, out: &mut Vec<Candidate<'a>>) {
    let sections: Vec<NodeRef<'a>> = doc
        .root()
        .descendants()
        .filter(|n| n.kind().is_section())
        .collect();

    for reference in &keywords.sections {
        let wanted = reference.name.trim();
        let mut matches: Vec<NodeRef<'a>> = sections
            .iter()
            .copied()
            .filter(|n| n.name().is_some_and(|name| name.trim().eq_ignore_ascii_case(wanted)))
            .collect();
        // Nodes of the kind the instruction named come first.
        matches.sort_by_key(|n| Some(n.kind()) != reference.kind);
        out.extend(matches.into_iter().map(|node| Candidate {
            node,
            score: SECTION_NAME_SCORE,
            strategy: Strategy::SectionName,
        }));
    }
}

fn keyword_matches<'a>(root: NodeRef<'a>, keywords: &Keywords, out: &mut Vec<Candidate<'a>>) {
    let usable = keywords
        .ordered()
        .into_iter()
        .filter(|k| k.chars().count() >= MIN_KEYWORD_LEN);

    // The score steps down with every candidate, across keywords.
    let mut rank: u32 = 0;
    for keyword in usable {
        for node in anchor(find_by_content(root, keyword)).into_iter().take(MATCHES_PER_KEYWORD) {
            out.push(Candidate {
                node,
                score: (KEYWORD_SCORE - KEYWORD_STEP * f64::from(rank)).max(KEYWORD_FLOOR),
                strategy: Strategy::Keyword,
            });
            rank += 1;
        }
    }
}

fn environment_types<'a>(root: NodeRef<'a>, suggestion: &str, out: &mut Vec<Candidate<'a>>) {
    for caps in BEGIN_ENV.captures_iter(suggestion) {
        let name = caps[1].trim();
        out.extend(find_by_name(root, name).into_iter().map(|node| Candidate {
            node,
            score: ENVIRONMENT_SCORE,
            strategy: Strategy::Environment,
        }));
    }

    if MATH_DELIMITER.is_match(suggestion) {
        out.extend(
            find_by_kind(root, NodeKind::Equation)
                .into_iter()
                .take(EQUATIONS_FROM_MATH)
                .map(|node| Candidate {
                    node,
                    score: ENVIRONMENT_SCORE,
                    strategy: Strategy::Environment,
                }),
        );
    }
}

/// Turn raw content matches into edit targets.
///
/// Text nodes are lifted to their nearest structural ancestor, Root is
/// dropped, and any match that contains another match is discarded so only
/// the most specific nodes remain. Document order is preserved.
fn anchor(matches: Vec<NodeRef<'_>>) -> Vec<NodeRef<'_>> {
    let mut lifted: Vec<NodeRef<'_>> = Vec::with_capacity(matches.len());
    for node in matches {
        let node = if node.kind() == NodeKind::Text {
            match node.parent() {
                Some(parent) => parent,
                None => continue,
            }
        } else {
            node
        };
        if node.kind() == NodeKind::Root || lifted.contains(&node) {
            continue;
        }
        lifted.push(node);
    }

    let specific: Vec<NodeRef<'_>> = lifted
        .iter()
        .copied()
        .filter(|candidate| !lifted.iter().any(|other| candidate.is_ancestor_of(other)))
        .collect();
    let mut ordered = specific;
    ordered.sort_by_key(|n| (n.start(), std::cmp::Reverse(n.end())));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tex::parse;

    const PAPER: &str = r"\documentclass{article}
\begin{document}
\section{Introduction}
We study mass and energy.
\section{Theory}
\begin{equation}
E = mc^2 \label{eq:energy}
\end{equation}
\begin{figure}
\includegraphics{setup}
\end{figure}
\end{document}
";

    #[test]
    fn anchoring_prefers_most_specific_node() {
        let doc = parse(PAPER);
        let hits = anchor(find_by_content(doc.root(), "eq:energy"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind(), NodeKind::Equation);
    }

    #[test]
    fn section_name_is_case_insensitive() {
        let doc = parse(PAPER);
        let found = candidates(&doc, "rewrite the section called theory", "");
        assert_eq!(found[0].strategy, Strategy::SectionName);
        assert_eq!(found[0].node.name(), Some("Theory"));
        assert_eq!(found[0].score, SECTION_NAME_SCORE);
    }

    #[test]
    fn keyword_scores_decay_per_candidate() {
        let doc = parse(
            "\\begin{document}\n\\section{A}\nenergy one\n\\section{B}\nenergy two\n\\section{C}\nenergy three\n\\end{document}\n",
        );
        let found = candidates(&doc, "rewrite the text about energy", "");
        let scored: Vec<_> = found.iter().map(|c| (c.node.name().unwrap(), c.score)).collect();
        assert_eq!(scored.len(), 3);
        for ((name, score), (expected_name, expected)) in scored.iter().zip([("A", 0.7), ("B", 0.65), ("C", 0.6)]) {
            assert_eq!(*name, expected_name);
            assert!((score - expected).abs() < 1e-9, "{name}: {score}");
        }
        assert!(found.iter().all(|c| c.strategy == Strategy::Keyword));
    }

    #[test]
    fn keyword_scores_stop_at_floor() {
        let section = "alpha beta gamma delta omega\n";
        let doc = parse(&format!(
            "\\begin{{document}}\n\\section{{A}}\n{section}\\section{{B}}\n{section}\\section{{C}}\n{section}\\end{{document}}\n"
        ));
        let keywords = Keywords::extract(r#"use "alpha", "beta", "gamma", "delta" and "omega""#);
        let mut found = Vec::new();
        keyword_matches(doc.root(), &keywords, &mut found);
        assert_eq!(found.len(), 15);
        assert!((found[1].score - 0.65).abs() < 1e-9);
        assert!((found[2].score - 0.6).abs() < 1e-9);
        assert_eq!(found[14].score, KEYWORD_FLOOR);
    }

    #[test]
    fn quoted_suggestion_text_scores_highest() {
        let doc = parse(PAPER);
        let found = candidates(&doc, "fix it", r#"Change "We study mass and energy" to something else"#);
        assert_eq!(found[0].strategy, Strategy::ExactContent);
        assert_eq!(found[0].node.name(), Some("Introduction"));
    }

    #[test]
    fn environment_in_suggestion() {
        let doc = parse(PAPER);
        let found = candidates(&doc, "tweak it", "\\begin{figure}\\includegraphics{new}\\end{figure}");
        assert_eq!(found[0].strategy, Strategy::Environment);
        assert_eq!(found[0].node.name(), Some("figure"));
    }

    #[test]
    fn candidates_are_unique_per_node() {
        let doc = parse(PAPER);
        let found = candidates(&doc, "update the equation about energy", "$E$");
        let mut ids: Vec<_> = found.iter().map(|c| c.node.id()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}
