use crate::tex::diagnostics::Diagnostics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Structural category of a node in the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Preamble,
    Body,
    Postamble,
    DocumentClass,
    Package,
    Section,
    Subsection,
    Subsubsection,
    /// `\paragraph{...}` sectioning level, not a prose paragraph.
    Paragraph,
    Subparagraph,
    Environment,
    Equation,
    Text,
}

impl NodeKind {
    /// Map a sectioning command name (without backslash or star) to its kind.
    pub fn from_sectioning_command(command: &str) -> Option<Self> {
        match command {
            "section" => Some(NodeKind::Section),
            "subsection" => Some(NodeKind::Subsection),
            "subsubsection" => Some(NodeKind::Subsubsection),
            "paragraph" => Some(NodeKind::Paragraph),
            "subparagraph" => Some(NodeKind::Subparagraph),
            _ => None,
        }
    }

    /// Nesting level of a sectioning kind (1 = `\section`).
    pub fn section_level(self) -> Option<u8> {
        match self {
            NodeKind::Section => Some(1),
            NodeKind::Subsection => Some(2),
            NodeKind::Subsubsection => Some(3),
            NodeKind::Paragraph => Some(4),
            NodeKind::Subparagraph => Some(5),
            _ => None,
        }
    }

    pub fn is_section(self) -> bool {
        self.section_level().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Preamble => "preamble",
            NodeKind::Body => "body",
            NodeKind::Postamble => "postamble",
            NodeKind::DocumentClass => "document_class",
            NodeKind::Package => "package",
            NodeKind::Section => "section",
            NodeKind::Subsection => "subsection",
            NodeKind::Subsubsection => "subsubsection",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Subparagraph => "subparagraph",
            NodeKind::Environment => "environment",
            NodeKind::Equation => "equation",
            NodeKind::Text => "text",
        }
    }

    /// Parse the snake_case name used by the CLI and JSON output.
    pub fn parse(s: &str) -> Option<Self> {
        const ALL: [NodeKind; 14] = [
            NodeKind::Root,
            NodeKind::Preamble,
            NodeKind::Body,
            NodeKind::Postamble,
            NodeKind::DocumentClass,
            NodeKind::Package,
            NodeKind::Section,
            NodeKind::Subsection,
            NodeKind::Subsubsection,
            NodeKind::Paragraph,
            NodeKind::Subparagraph,
            NodeKind::Environment,
            NodeKind::Equation,
            NodeKind::Text,
        ];
        ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a node inside its [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node stored in the arena. Offsets are byte offsets into the source.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub name: Option<String>,
    /// Starting byte offset (inclusive)
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
    pub line_start: usize,
    pub line_end: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub meta: BTreeMap<String, String>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            name: None,
            start,
            end,
            line_start: 0,
            line_end: 0,
            parent: None,
            children: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A parsed LaTeX document: the immutable source, the node arena and the
/// diagnostics collected while parsing.
///
/// The tree is never mutated after [`crate::tex::parse`] returns. A changed
/// source requires a fresh parse.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    nodes: Vec<Node>,
    diagnostics: Diagnostics,
}

impl Document {
    pub(crate) fn from_parts(source: String, nodes: Vec<Node>, diagnostics: Diagnostics) -> Self {
        Self {
            source,
            nodes,
            diagnostics,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            doc: self,
            id: NodeId(0),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then_some(NodeRef { doc: self, id })
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// The Body node, if the document has one.
    pub fn body(&self) -> Option<NodeRef<'_>> {
        self.root()
            .children()
            .find(|child| child.kind() == NodeKind::Body)
    }

    pub fn preamble(&self) -> Option<NodeRef<'_>> {
        self.root()
            .children()
            .find(|child| child.kind() == NodeKind::Preamble)
    }

    /// Render the tree as a serializable summary (used for JSON output).
    pub fn summary(&self) -> NodeSummary {
        self.root().summary()
    }
}

/// Borrowed handle to a node. Cheap to copy; lives as long as the document.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn node(&self) -> &'a Node {
        self.doc.node(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.node().kind
    }

    pub fn name(&self) -> Option<&'a str> {
        self.node().name.as_deref()
    }

    pub fn start(&self) -> usize {
        self.node().start
    }

    pub fn end(&self) -> usize {
        self.node().end
    }

    pub fn line_start(&self) -> usize {
        self.node().line_start
    }

    pub fn line_end(&self) -> usize {
        self.node().line_end
    }

    pub fn meta(&self, key: &str) -> Option<&'a str> {
        self.node().meta.get(key).map(String::as_str)
    }

    /// The slice of the source this node spans.
    pub fn content(&self) -> &'a str {
        let node = self.node();
        &self.doc.source[node.start..node.end]
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| NodeRef { doc: self.doc, id })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        self.doc
            .node(self.id)
            .children
            .iter()
            .map(move |&id| NodeRef { doc, id })
    }

    /// Pre-order traversal starting at (and including) this node.
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants {
            doc: self.doc,
            stack: vec![self.id],
        }
    }

    /// Parents of this node, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    pub fn is_ancestor_of(&self, other: &NodeRef<'_>) -> bool {
        other.ancestors().any(|ancestor| ancestor.id == self.id)
    }

    pub fn summary(&self) -> NodeSummary {
        let node = self.node();
        NodeSummary {
            kind: node.kind,
            name: node.name.clone(),
            start: node.start,
            end: node.end,
            line_start: node.line_start,
            line_end: node.line_end,
            meta: node.meta.clone(),
            children: self.children().map(|child| child.summary()).collect(),
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node();
        f.debug_struct("NodeRef")
            .field("id", &self.id.0)
            .field("kind", &node.kind)
            .field("name", &node.name)
            .field("span", &(node.start..node.end))
            .finish()
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.doc.node(id);
        self.stack.extend(node.children.iter().rev().copied());
        Some(NodeRef { doc: self.doc, id })
    }
}

/// Owned, serializable view of a subtree.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub start: usize,
    pub end: usize,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_its_name() {
        for kind in [NodeKind::DocumentClass, NodeKind::Subsubsection, NodeKind::Text] {
            assert_eq!(NodeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NodeKind::parse("chapter"), None);
    }

    #[test]
    fn section_levels_are_ordered() {
        assert_eq!(NodeKind::from_sectioning_command("section"), Some(NodeKind::Section));
        assert!(NodeKind::Section.section_level() < NodeKind::Subsection.section_level());
        assert_eq!(NodeKind::Environment.section_level(), None);
        assert!(!NodeKind::Text.is_section());
    }
}
