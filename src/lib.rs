//! texpatch: the document-editing core of a LaTeX authoring assistant
//!
//! Parses LaTeX into a position-indexed tree, resolves natural-language edit
//! instructions onto that tree, and turns free-form model output into
//! validated patches with bounded retry across two output grammars.
//!
//! # Architecture
//!
//! All source mutations compile down to a single primitive: [`Edit`], a
//! verified byte-span replacement. Intelligence lives in span acquisition
//! (the [`tex`] tree, the [`intent`] resolver, the [`diff`] extractors), not
//! in the application logic.
//!
//! # Safety
//!
//! - All edits verify expected before-text before applying
//! - Search blocks must match exactly once
//! - Failed hunks and blocks never abort their siblings
//! - The library never writes storage; [`edit::atomic_write`] is offered to
//!   callers that do
//!
//! # Example
//!
//! ```
//! use texpatch::{intent, tex, EditType};
//!
//! let source = "\\begin{document}\n\\section{Intro}\nHello.\n\\end{document}\n";
//! let doc = tex::parse(source);
//! let edit_intent = intent::resolve(&doc, "delete the section called Intro", "");
//! assert_eq!(edit_intent.edit_type, EditType::Delete);
//!
//! let mut text = source.to_string();
//! edit_intent.to_edit().apply_to(&mut text).unwrap();
//! assert!(!text.contains("Hello."));
//! ```

pub mod config;
pub mod diff;
pub mod edit;
pub mod escalation;
pub mod intent;
pub mod patch;
pub mod prompt;
pub mod tex;
pub mod validate;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, EngineConfig};
pub use diff::{DiffHunk, EditSet, FormatError, Grammar, SearchReplaceBlock};
pub use edit::{Edit, EditError, EditResult, EditVerification};
pub use escalation::{
    CommandClient, CompletionClient, EscalationError, EscalationOutcome, EscalationRunner, Tier,
    UpstreamError,
};
pub use intent::{EditIntent, EditType};
pub use patch::{apply_edit_set, PatchError, PatchOptions, PatchReport, PatchResult};
pub use prompt::{CompletionRequest, EditTask};
pub use tex::{parse, Document, NodeKind, NodeRef};
pub use validate::{SelectorValidator, ValidationError};
