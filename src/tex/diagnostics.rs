//! Per-parse diagnostics collector.
//!
//! The parser never fails. Everything it had to degrade (missing
//! `\begin{document}`, unmatched environments, depth truncation, unterminated
//! math) is recorded here and returned with the [`Document`](super::Document),
//! so callers can inspect warnings without a global logger.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    MissingBeginDocument,
    MissingEndDocument,
    UnmatchedBegin,
    UnmatchedEnd,
    DepthLimit,
    UnterminatedMath,
    UnterminatedArgument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    /// Byte offset the diagnostic refers to, when it has one.
    pub offset: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        match self.offset {
            Some(offset) => write!(f, "{level} at byte {offset}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, code: DiagnosticCode, offset: Option<usize>, message: impl Into<String>) {
        self.push(Severity::Warning, code, offset, message.into());
    }

    pub fn info(&mut self, code: DiagnosticCode, offset: Option<usize>, message: impl Into<String>) {
        self.push(Severity::Info, code, offset, message.into());
    }

    fn push(&mut self, severity: Severity, code: DiagnosticCode, offset: Option<usize>, message: String) {
        match severity {
            Severity::Warning => tracing::warn!(?code, ?offset, "{message}"),
            Severity::Info => tracing::debug!(?code, ?offset, "{message}"),
        }
        self.entries.push(Diagnostic {
            severity,
            code,
            offset,
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, code: &DiagnosticCode) -> bool {
        self.entries.iter().any(|d| &d.code == code)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}
