//! Read-only searches over a parsed [`Document`](super::Document).
//!
//! All searches are pre-order (root first, then children in document order)
//! and include the starting node itself.

use crate::tex::node::{NodeKind, NodeRef};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown node kind '{0}'")]
    UnknownKind(String),
}

pub fn find_by_kind<'a>(root: NodeRef<'a>, kind: NodeKind) -> Vec<NodeRef<'a>> {
    root.descendants().filter(|n| n.kind() == kind).collect()
}

/// Nodes whose content contains `needle` as a substring.
pub fn find_by_content<'a>(root: NodeRef<'a>, needle: &str) -> Vec<NodeRef<'a>> {
    root.descendants()
        .filter(|n| n.content().contains(needle))
        .collect()
}

/// Nodes whose content matches `pattern` anywhere.
pub fn find_by_pattern<'a>(root: NodeRef<'a>, pattern: &Regex) -> Vec<NodeRef<'a>> {
    root.descendants()
        .filter(|n| pattern.is_match(n.content()))
        .collect()
}

/// Nodes whose name equals `name` exactly.
pub fn find_by_name<'a>(root: NodeRef<'a>, name: &str) -> Vec<NodeRef<'a>> {
    root.descendants()
        .filter(|n| n.name() == Some(name))
        .collect()
}

/// A query chosen at runtime.
#[derive(Debug, Clone)]
pub enum TreeQuery {
    Kind(NodeKind),
    Content(String),
    Pattern(Regex),
    Name(String),
}

impl TreeQuery {
    pub fn kind(name: &str) -> Result<Self, QueryError> {
        NodeKind::parse(name)
            .map(TreeQuery::Kind)
            .ok_or_else(|| QueryError::UnknownKind(name.to_string()))
    }

    pub fn pattern(pattern: &str) -> Result<Self, QueryError> {
        Regex::new(pattern)
            .map(TreeQuery::Pattern)
            .map_err(|source| QueryError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn run<'a>(&self, root: NodeRef<'a>) -> Vec<NodeRef<'a>> {
        match self {
            TreeQuery::Kind(kind) => find_by_kind(root, *kind),
            TreeQuery::Content(needle) => find_by_content(root, needle),
            TreeQuery::Pattern(re) => find_by_pattern(root, re),
            TreeQuery::Name(name) => find_by_name(root, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tex::parse;

    const SRC: &str = r"\documentclass{article}
\begin{document}
\section{Methods}
We measure $x$.
\begin{figure}
\includegraphics{plot}
\end{figure}
\section{Results}
Energy \(E\).
\end{document}
";

    #[test]
    fn kind_search_is_pre_order() {
        let doc = parse(SRC);
        let sections = find_by_kind(doc.root(), NodeKind::Section);
        let names: Vec<_> = sections.iter().map(|n| n.name().unwrap()).collect();
        assert_eq!(names, vec!["Methods", "Results"]);

        let equations = find_by_kind(doc.root(), NodeKind::Equation);
        assert_eq!(equations.len(), 2);
        assert!(equations[0].start() < equations[1].start());
    }

    #[test]
    fn content_search_includes_ancestors() {
        let doc = parse(SRC);
        let hits = find_by_content(doc.root(), "includegraphics");
        assert_eq!(hits[0], doc.root());
        assert!(hits.iter().any(|n| n.name() == Some("figure")));
        assert!(find_by_content(doc.root(), "absent").is_empty());
    }

    #[test]
    fn pattern_and_name_search() {
        let doc = parse(SRC);
        let query = TreeQuery::pattern(r"Energy \\\(\w\\\)").unwrap();
        let hits = query.run(doc.root());
        assert!(hits.iter().any(|n| n.name() == Some("Results")));

        let figures = find_by_name(doc.root(), "figure");
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].kind(), NodeKind::Environment);
    }

    #[test]
    fn invalid_pattern_and_kind_are_errors() {
        assert!(matches!(
            TreeQuery::pattern("("),
            Err(QueryError::InvalidPattern { .. })
        ));
        assert!(matches!(TreeQuery::kind("chapter"), Err(QueryError::UnknownKind(_))));
        assert!(matches!(TreeQuery::kind("section"), Ok(TreeQuery::Kind(NodeKind::Section))));
    }
}
