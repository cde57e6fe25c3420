//! Bounded retry and escalation across the two output grammars.
//!
//! Tier 1 asks for a unified diff; once its attempts are spent, tier 2 asks
//! for search/replace blocks. Server, network and timeout failures and
//! unusable responses are retried with linear backoff, a 4xx response ends
//! the workflow at once, and exhausting both tiers is a structured error.
//! The transitions are computed by [`decide`], which has no side effects.

pub mod command;
pub mod errors;
pub mod runner;
pub mod state;

pub use command::CommandClient;
pub use errors::{EscalationError, UpstreamError};
pub use runner::{CompletionClient, EscalationOutcome, EscalationRunner, Sleep, ThreadSleep};
pub use state::{decide, AttemptRecord, Decision, FailureClass, RetryPolicy, State, Tier};
