//! The retry/escalation state machine as a pure decision function.

use crate::config::EscalationConfig;
use crate::diff::Grammar;
use crate::escalation::errors::UpstreamError;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Output grammar tier. Tier 1 is always tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    UnifiedDiff,
    SearchReplace,
}

impl Tier {
    pub fn number(self) -> u8 {
        match self {
            Tier::UnifiedDiff => 1,
            Tier::SearchReplace => 2,
        }
    }

    pub fn grammar(self) -> Grammar {
        match self {
            Tier::UnifiedDiff => Grammar::UnifiedDiff,
            Tier::SearchReplace => Grammar::SearchReplace,
        }
    }

    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::UnifiedDiff => Some(Tier::SearchReplace),
            Tier::SearchReplace => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.grammar())
    }
}

/// How an attempt failed, for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "status")]
pub enum FailureClass {
    /// 5xx response
    Server,
    Network,
    Timeout,
    /// 4xx response; never retried
    Client(u16),
    /// The response did not parse in the tier's grammar
    Format,
}

impl FailureClass {
    pub fn is_fatal(self) -> bool {
        matches!(self, FailureClass::Client(_))
    }
}

impl From<&UpstreamError> for FailureClass {
    fn from(error: &UpstreamError) -> Self {
        match error {
            UpstreamError::Status { status, .. } if (400..500).contains(status) => FailureClass::Client(*status),
            UpstreamError::Status { .. } => FailureClass::Server,
            UpstreamError::Timeout(_) => FailureClass::Timeout,
            UpstreamError::Network(_) => FailureClass::Network,
        }
    }
}

/// Attempt budgets and backoff bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub unified_diff_attempts: u32,
    pub search_replace_attempts: u32,
    pub server_error_backoff: Duration,
    pub format_error_backoff: Duration,
}

impl RetryPolicy {
    pub fn attempts(&self, tier: Tier) -> u32 {
        match tier {
            Tier::UnifiedDiff => self.unified_diff_attempts,
            Tier::SearchReplace => self.search_replace_attempts,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt`.
    pub fn backoff(&self, class: FailureClass, attempt: u32) -> Duration {
        let base = match class {
            FailureClass::Format => self.format_error_backoff,
            _ => self.server_error_backoff,
        };
        base * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&EscalationConfig::default())
    }
}

impl From<&EscalationConfig> for RetryPolicy {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            unified_diff_attempts: config.unified_diff_attempts,
            search_replace_attempts: config.search_replace_attempts,
            server_error_backoff: Duration::from_millis(config.server_error_backoff_ms),
            format_error_backoff: Duration::from_millis(config.format_error_backoff_ms),
        }
    }
}

/// States of one escalation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Attempting { tier: Tier, attempt: u32 },
    RetryableFailure { tier: Tier, attempt: u32, class: FailureClass },
    FatalFailure { tier: Tier, attempt: u32, class: FailureClass },
    Success { tier: Tier, attempt: u32 },
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Try the same tier again after `delay`.
    Retry { tier: Tier, attempt: u32, delay: Duration },
    /// Move to the next tier's first attempt.
    Escalate { tier: Tier },
    /// Stop; the workflow has failed.
    Fail,
}

/// Decide the next step after attempt `attempt` (1-based) of `tier` failed
/// with `class`.
pub fn decide(policy: &RetryPolicy, tier: Tier, attempt: u32, class: FailureClass) -> Decision {
    if class.is_fatal() {
        return Decision::Fail;
    }
    if attempt < policy.attempts(tier) {
        return Decision::Retry {
            tier,
            attempt: attempt + 1,
            delay: policy.backoff(class, attempt),
        };
    }
    match tier.next() {
        Some(next) => Decision::Escalate { tier: next },
        None => Decision::Fail,
    }
}

/// One attempt as recorded in the outcome trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub tier: Tier,
    pub attempt: u32,
    /// `None` for the successful attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Wait before the next attempt.
    pub delay_ms: u64,
}
