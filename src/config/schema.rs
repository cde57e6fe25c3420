use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Engine settings, usually read from `texpatch.toml`. Every section and
/// every key is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub patch: PatchSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_depth: 20 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EscalationConfig {
    pub unified_diff_attempts: u32,
    pub search_replace_attempts: u32,
    /// Base delay before retrying after a 5xx, network error or timeout;
    /// multiplied by the attempt number.
    pub server_error_backoff_ms: u64,
    /// Base delay before retrying after an unusable response.
    pub format_error_backoff_ms: u64,
    /// Raw-response characters kept in the terminal error.
    pub excerpt_chars: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            unified_diff_attempts: 3,
            search_replace_attempts: 2,
            server_error_backoff_ms: 1_000,
            format_error_backoff_ms: 2_000,
            excerpt_chars: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    /// Shell command that reads a request on stdin and prints the completion.
    pub command: Option<String>,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: 0.2,
            max_tokens: 4096,
            timeout_ms: 60_000,
            command: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PatchSettings {
    /// Fail hunks whose `@@` line counts disagree with their bodies.
    pub strict_hunk_headers: bool,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.parser.max_depth == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "parser.max_depth",
                message: "must be at least 1".to_string(),
            });
        }
        if self.escalation.unified_diff_attempts == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "escalation.unified_diff_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.escalation.search_replace_attempts == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "escalation.search_replace_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.upstream.model.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "upstream.model",
            });
        }
        if !(0.0..=2.0).contains(&self.upstream.temperature) {
            issues.push(ValidationIssue::OutOfRange {
                field: "upstream.temperature",
                message: format!("{} is outside 0.0..=2.0", self.upstream.temperature),
            });
        }
        if self.upstream.max_tokens == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "upstream.max_tokens",
                message: "must be at least 1".to_string(),
            });
        }
        if self.upstream.timeout_ms == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "upstream.timeout_ms",
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(command) = &self.upstream.command {
            if command.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    field: "upstream.command",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    OutOfRange { field: &'static str, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => write!(f, "'{field}' must not be empty"),
            ValidationIssue::OutOfRange { field, message } => write!(f, "'{field}' {message}"),
        }
    }
}
