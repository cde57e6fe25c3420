use crate::config::EngineConfig;
use crate::diff::{excerpt, EditSet};
use crate::escalation::errors::{EscalationError, UpstreamError};
use crate::escalation::state::{decide, AttemptRecord, Decision, FailureClass, RetryPolicy, State, Tier};
use crate::prompt::{CompletionRequest, EditTask, PromptBuilder};
use serde::Serialize;
use std::time::Duration;

/// Source of completions. Implementations must enforce their own timeout
/// and report it as [`UpstreamError::Timeout`].
pub trait CompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for &C {
    fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        (**self).complete(request)
    }
}

/// Waits between attempts.
pub trait Sleep {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Validated edits plus the trace of attempts that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationOutcome {
    pub edits: EditSet,
    pub tier: Tier,
    pub attempts: Vec<AttemptRecord>,
}

/// Drives one edit workflow through the tiers, strictly one attempt at a time.
pub struct EscalationRunner<C, S = ThreadSleep> {
    client: C,
    sleeper: S,
    policy: RetryPolicy,
    prompts: PromptBuilder,
    excerpt_chars: usize,
}

impl<C: CompletionClient> EscalationRunner<C, ThreadSleep> {
    pub fn new(client: C, config: &EngineConfig) -> Self {
        Self::with_sleep(client, ThreadSleep, config)
    }
}

impl<C: CompletionClient, S: Sleep> EscalationRunner<C, S> {
    pub fn with_sleep(client: C, sleeper: S, config: &EngineConfig) -> Self {
        Self {
            client,
            sleeper,
            policy: RetryPolicy::from(&config.escalation),
            prompts: PromptBuilder::new(&config.upstream),
            excerpt_chars: config.escalation.excerpt_chars,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the workflow to a validated edit set or a terminal error.
    pub fn run(&self, task: &EditTask<'_>) -> Result<EscalationOutcome, EscalationError> {
        let mut tier = Tier::UnifiedDiff;
        let mut attempt = 1;
        let mut feedback: Option<String> = None;
        let mut attempts = Vec::new();
        let mut last_response: Option<String> = None;

        loop {
            let state = State::Attempting { tier, attempt };
            tracing::info!(?state, "requesting edits");
            let request = self.prompts.edit_request(tier.grammar(), task, feedback.as_deref());

            let (class, message) = match self.client.complete(&request) {
                Ok(response) => match tier.grammar().extract(&response) {
                    Ok(edits) => {
                        let state = State::Success { tier, attempt };
                        tracing::info!(?state, changes = edits.len(), "edits extracted");
                        attempts.push(AttemptRecord {
                            tier,
                            attempt,
                            failure: None,
                            message: None,
                            delay_ms: 0,
                        });
                        return Ok(EscalationOutcome { edits, tier, attempts });
                    }
                    Err(error) => {
                        let message = error.to_string();
                        feedback = Some(message.clone());
                        last_response = Some(response);
                        (FailureClass::Format, message)
                    }
                },
                Err(error) => {
                    let class = FailureClass::from(&error);
                    if class.is_fatal() {
                        let state = State::FatalFailure { tier, attempt, class };
                        tracing::error!(?state, %error, "upstream rejected request");
                        attempts.push(AttemptRecord {
                            tier,
                            attempt,
                            failure: Some(class),
                            message: Some(error.to_string()),
                            delay_ms: 0,
                        });
                        return Err(EscalationError::Rejected {
                            tier,
                            attempt,
                            error,
                            attempts,
                        });
                    }
                    (class, error.to_string())
                }
            };

            let state = State::RetryableFailure { tier, attempt, class };
            tracing::warn!(?state, %message, "attempt failed");
            let decision = decide(&self.policy, tier, attempt, class);
            let delay = match decision {
                Decision::Retry { delay, .. } => delay,
                _ => Duration::ZERO,
            };
            attempts.push(AttemptRecord {
                tier,
                attempt,
                failure: Some(class),
                message: Some(message.clone()),
                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            });

            match decision {
                Decision::Retry {
                    tier: next_tier,
                    attempt: next_attempt,
                    delay,
                } => {
                    self.sleeper.sleep(delay);
                    tier = next_tier;
                    attempt = next_attempt;
                }
                Decision::Escalate { tier: next_tier } => {
                    tracing::info!(from = %tier, to = %next_tier, "escalating");
                    tier = next_tier;
                    attempt = 1;
                    feedback = None;
                }
                Decision::Fail => {
                    tracing::error!(attempts = attempts.len(), "escalation exhausted");
                    return Err(EscalationError::Exhausted {
                        last_failure: message,
                        excerpt: last_response.map(|text| excerpt(&text, self.excerpt_chars)),
                        attempts,
                    });
                }
            }
        }
    }

    /// Run the edit workflow and the companion explanation request side by
    /// side over the same snapshot.
    pub fn run_with_explanation(
        &self,
        task: &EditTask<'_>,
    ) -> (Result<EscalationOutcome, EscalationError>, Result<String, UpstreamError>)
    where
        C: Sync,
        S: Sync,
    {
        let explanation_request = self.prompts.explanation_request(task);
        std::thread::scope(|scope| {
            let explanation = scope.spawn(|| self.client.complete(&explanation_request));
            let edits = self.run(task);
            let explanation = explanation
                .join()
                .unwrap_or_else(|_| Err(UpstreamError::Network("explanation worker panicked".to_string())));
            (edits, explanation)
        })
    }
}
