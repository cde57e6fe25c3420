//! LaTeX structure parsing and tree queries.
//!
//! The parser is a position-indexing scanner, not a TeX engine: it finds the
//! preamble/body split, packages, sectioning commands, environments and math,
//! and records everything else as text spans. Every node's content is a
//! slice of the original source, so a node's `[start, end)` can be handed
//! directly to an [`Edit`](crate::Edit).

pub mod diagnostics;
pub mod node;
pub mod parser;
pub mod query;
pub mod scan;

pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use node::{Document, Node, NodeId, NodeKind, NodeRef, NodeSummary};
pub use parser::{parse, parse_with, ParseOptions};
pub use query::{find_by_content, find_by_kind, find_by_name, find_by_pattern, QueryError, TreeQuery};
