//! Escalation workflows against a scripted upstream.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use texpatch::diff::EditSet;
use texpatch::escalation::{
    CompletionClient, EscalationError, EscalationRunner, FailureClass, Sleep, Tier, UpstreamError,
};
use texpatch::patch::{apply_edit_set, PatchOptions};
use texpatch::prompt::{CompletionRequest, EditTask};
use texpatch::EngineConfig;

const SOURCE: &str = "\\documentclass{article}
\\begin{document}
\\section{Intro}
Teh results are clear.
\\end{document}
";

const TIER2_RESPONSE: &str = "```json
{\"explanation\": \"Fix the typo.\", \"search_replace_blocks\": [{\"search\": \"Teh results\", \"replace\": \"The results\"}]}
```";

/// Replies from a fixed script and records every request it receives.
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, UpstreamError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<&str, UpstreamError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.messages.last().unwrap().content.clone())
            .collect()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(UpstreamError::Network("script exhausted".to_string())))
    }
}

#[derive(Default)]
struct RecordingSleep {
    delays: Mutex<Vec<Duration>>,
}

impl Sleep for &RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn task() -> EditTask<'static> {
    EditTask {
        file_name: "main.tex",
        source: SOURCE,
        instruction: "fix the typo in the introduction",
    }
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn tier1_format_failures_escalate_to_tier2() {
    let client = ScriptedClient::new(vec![
        Ok("You should fix the typo."),
        Ok("```diff\n@@ -4 +4 @@\n-Teh\n+The\n```"),
        Ok("I cannot produce a diff."),
        Ok(TIER2_RESPONSE),
    ]);
    let sleeper = RecordingSleep::default();
    let runner = EscalationRunner::with_sleep(&client, &sleeper, &EngineConfig::default());

    let outcome = runner.run(&task()).unwrap();

    assert_eq!(outcome.tier, Tier::SearchReplace);
    assert_eq!(outcome.attempts.len(), 4);
    assert!(outcome.attempts[..3]
        .iter()
        .all(|a| a.tier == Tier::UnifiedDiff && a.failure == Some(FailureClass::Format)));
    assert_eq!(outcome.attempts[3].failure, None);
    // Format retries back off 2 s per attempt; escalation itself does not wait.
    assert_eq!(*sleeper.delays.lock().unwrap(), vec![secs(2), secs(4)]);

    let prompts = client.prompts();
    assert!(!prompts[0].contains("could not be used"));
    assert!(prompts[1].contains("could not be used"));
    assert!(!prompts[3].contains("could not be used"));

    let report = apply_edit_set(SOURCE, &outcome.edits, &PatchOptions::default());
    assert!(report.is_clean());
    assert!(report.text.contains("The results are clear."));
}

#[test]
fn server_errors_retry_with_shorter_backoff() {
    let diff = "```diff\n--- a/main.tex\n+++ b/main.tex\n@@ -4,1 +4,1 @@\n-Teh results are clear.\n+The results are clear.\n```";
    let client = ScriptedClient::new(vec![
        Err(UpstreamError::Status {
            status: 503,
            message: "overloaded".to_string(),
        }),
        Err(UpstreamError::Timeout(secs(60))),
        Ok(diff),
    ]);
    let sleeper = RecordingSleep::default();
    let runner = EscalationRunner::with_sleep(&client, &sleeper, &EngineConfig::default());

    let outcome = runner.run(&task()).unwrap();

    assert_eq!(outcome.tier, Tier::UnifiedDiff);
    assert_eq!(*sleeper.delays.lock().unwrap(), vec![secs(1), secs(2)]);
    let report = apply_edit_set(SOURCE, &outcome.edits, &PatchOptions::default());
    assert_eq!(report.applied(), 1);
    assert!(report.text.contains("The results are clear."));
}

#[test]
fn client_error_aborts_immediately() {
    let client = ScriptedClient::new(vec![Err(UpstreamError::Status {
        status: 401,
        message: "bad key".to_string(),
    })]);
    let sleeper = RecordingSleep::default();
    let runner = EscalationRunner::with_sleep(&client, &sleeper, &EngineConfig::default());

    let err = runner.run(&task()).unwrap_err();

    assert!(matches!(
        err,
        EscalationError::Rejected {
            tier: Tier::UnifiedDiff,
            attempt: 1,
            ..
        }
    ));
    assert_eq!(client.prompts().len(), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[test]
fn both_tiers_exhausted_is_a_structured_error() {
    let client = ScriptedClient::new(vec![
        Ok("prose"),
        Ok("prose"),
        Ok("prose"),
        Ok("still not json"),
        Ok("nothing useful here at all"),
    ]);
    let sleeper = RecordingSleep::default();
    let runner = EscalationRunner::with_sleep(&client, &sleeper, &EngineConfig::default());

    let err = runner.run(&task()).unwrap_err();

    assert_eq!(err.attempts().len(), 5);
    let EscalationError::Exhausted { excerpt, .. } = err else {
        panic!("expected exhaustion");
    };
    assert_eq!(excerpt.as_deref(), Some("nothing useful here at all"));
    assert_eq!(client.prompts().len(), 5);
}

#[test]
fn no_changes_is_success_not_failure() {
    let client = ScriptedClient::new(vec![Ok("```diff\n```")]);
    let sleeper = RecordingSleep::default();
    let runner = EscalationRunner::with_sleep(&client, &sleeper, &EngineConfig::default());

    let outcome = runner.run(&task()).unwrap();

    assert!(matches!(outcome.edits, EditSet::NoChanges { .. }));
    let report = apply_edit_set(SOURCE, &outcome.edits, &PatchOptions::default());
    assert_eq!(report.text, SOURCE);
}

#[test]
fn explanation_runs_alongside_the_edit_request() {
    struct Split;

    impl CompletionClient for Split {
        fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
            if request.messages[0].content.contains("Do not produce a diff") {
                Ok("The first word of the introduction is misspelled.".to_string())
            } else {
                Ok("```diff\n```".to_string())
            }
        }
    }

    let sleeper = RecordingSleep::default();
    let runner = EscalationRunner::with_sleep(Split, &sleeper, &EngineConfig::default());
    let (edits, explanation) = runner.run_with_explanation(&task());

    assert!(edits.unwrap().edits.is_empty());
    assert!(explanation.unwrap().contains("misspelled"));
}
