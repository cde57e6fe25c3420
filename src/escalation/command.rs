//! [`CompletionClient`] backed by an external command.
//!
//! The request is written to the command's stdin as JSON and the completion
//! is read from stdout. A non-zero exit whose stderr starts with
//! `status=<code>` reports that HTTP status; any other failure counts as a
//! network error.

use crate::escalation::errors::UpstreamError;
use crate::escalation::runner::CompletionClient;
use crate::prompt::CompletionRequest;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long pipe threads get to finish after the command is killed.
const KILL_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct CommandClient {
    command: String,
    timeout: Duration,
}

impl CommandClient {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl CompletionClient for CommandClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        let payload = serde_json::to_vec(request).map_err(|e| UpstreamError::Network(e.to_string()))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| UpstreamError::Network(format!("failed to start '{}': {e}", self.command)))?;

        let stdin = child.stdin.take();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A command that ignores its input closes the pipe early.
                let _ = stdin.write_all(&payload);
            }
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(command = %self.command, timeout = ?self.timeout, "upstream command timed out");

                    // Processes the command started may still hold the pipes.
                    let grace = Instant::now() + KILL_GRACE;
                    let settled = [
                        settle(writer, grace).is_some(),
                        settle(stdout, grace).is_some(),
                        settle(stderr, grace).is_some(),
                    ];
                    if settled.contains(&false) {
                        tracing::debug!(command = %self.command, "detaching pipe threads held open after kill");
                    }
                    return Err(UpstreamError::Timeout(self.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(UpstreamError::Network(e.to_string())),
            }
        };

        let _ = writer.join();
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if status.success() {
            return Ok(stdout);
        }
        Err(classify_failure(&stderr, status.code()))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut out = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut out);
        }
        out
    })
}

/// Join `handle` if it finishes before `deadline`; otherwise drop it,
/// detaching the thread.
fn settle<T>(handle: thread::JoinHandle<T>, deadline: Instant) -> Option<T> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
    handle.join().ok()
}

fn classify_failure(stderr: &str, code: Option<i32>) -> UpstreamError {
    let stderr = stderr.trim();
    if let Some(rest) = stderr.strip_prefix("status=") {
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(status) = digits.parse::<u16>() {
            return UpstreamError::Status {
                status,
                message: rest[digits.len()..].trim().to_string(),
            };
        }
    }
    match (stderr.is_empty(), code) {
        (true, Some(code)) => UpstreamError::Network(format!("command exited with status {code}")),
        (true, None) => UpstreamError::Network("command terminated by signal".to_string()),
        (false, _) => UpstreamError::Network(stderr.to_string()),
    }
}
