//! Upstream request construction.
//!
//! The request shape is vendor independent: a model name, a list of role
//! tagged messages, a sampling temperature and a token cap. Each grammar has
//! its own system prompt describing the output contract the extractors in
//! [`crate::diff`] enforce.

use crate::config::UpstreamConfig;
use crate::diff::Grammar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The document snapshot and instruction one workflow operates on.
#[derive(Debug, Clone, Copy)]
pub struct EditTask<'a> {
    /// File name shown to the model in diff headers.
    pub file_name: &'a str,
    pub source: &'a str,
    pub instruction: &'a str,
}

const UNIFIED_DIFF_CONTRACT: &str = "\
You edit LaTeX documents. Reply with the requested change as a unified diff \
inside a ```diff fenced code block. Each diff must contain a `--- a/FILE` \
line, a `+++ b/FILE` line and one or more `@@ -start,count +start,count @@` \
hunks whose counts match the hunk bodies. Context lines must be copied \
verbatim from the document. If nothing needs to change, reply with an empty \
```diff block.";

const SEARCH_REPLACE_CONTRACT: &str = "\
You edit LaTeX documents. Reply with JSON only, in the form \
{\"explanation\": string, \"search_replace_blocks\": [{\"search\": string, \
\"replace\": string, \"explanation\": string}]}. Every `search` must be copied \
verbatim from the document and must occur exactly once; include enough \
surrounding text to make it unique. Blocks are applied in order. If nothing \
needs to change, return an empty list and say so in the explanation.";

const EXPLANATION_CONTRACT: &str = "\
You review LaTeX documents. Explain in a few sentences what change the user \
is asking for and where in the document it applies. Do not produce a diff.";

/// Builds upstream requests from the configured model settings.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl PromptBuilder {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Request edits in `grammar`. `feedback` is the reason the previous
    /// response in the same grammar was rejected.
    pub fn edit_request(&self, grammar: Grammar, task: &EditTask<'_>, feedback: Option<&str>) -> CompletionRequest {
        let contract = match grammar {
            Grammar::UnifiedDiff => UNIFIED_DIFF_CONTRACT,
            Grammar::SearchReplace => SEARCH_REPLACE_CONTRACT,
        };
        let mut user = document_message(task, grammar == Grammar::UnifiedDiff);
        if let Some(feedback) = feedback {
            user.push_str("\n\nYour previous reply could not be used: ");
            user.push_str(feedback);
            user.push_str("\nReply again and follow the required format exactly.");
        }
        self.request(vec![Message::new(Role::System, contract), Message::new(Role::User, user)])
    }

    /// Companion request for a prose explanation of the edit.
    pub fn explanation_request(&self, task: &EditTask<'_>) -> CompletionRequest {
        self.request(vec![
            Message::new(Role::System, EXPLANATION_CONTRACT),
            Message::new(Role::User, document_message(task, false)),
        ])
    }

    fn request(&self, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn document_message(task: &EditTask<'_>, numbered: bool) -> String {
    let mut out = format!("File: {}\nInstruction: {}\n\n```latex\n", task.file_name, task.instruction);
    if numbered {
        for (i, line) in task.source.lines().enumerate() {
            out.push_str(&format!("{:>4} | {line}\n", i + 1));
        }
    } else {
        out.push_str(task.source);
        if !task.source.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str("```");
    out
}
