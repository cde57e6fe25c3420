use crate::escalation::state::{AttemptRecord, Tier};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an upstream completion call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream unreachable: {0}")]
    Network(String),
}

/// Terminal failure of the escalation workflow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EscalationError {
    #[error("upstream rejected the request at tier {tier} attempt {attempt}: {error}")]
    Rejected {
        tier: Tier,
        attempt: u32,
        error: UpstreamError,
        attempts: Vec<AttemptRecord>,
    },

    #[error("no usable edits after {} attempts; last failure: {last_failure}", attempts.len())]
    Exhausted {
        last_failure: String,
        /// Truncated raw text of the last response received, if any.
        excerpt: Option<String>,
        attempts: Vec<AttemptRecord>,
    },
}

impl EscalationError {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            EscalationError::Rejected { attempts, .. } | EscalationError::Exhausted { attempts, .. } => attempts,
        }
    }
}
