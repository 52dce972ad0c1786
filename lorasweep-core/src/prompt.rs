use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// How user text and template text are stitched together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Split every input into comma-separated clauses, drop the empty ones and
    /// re-join with `,`.
    #[default]
    Clauses,
    /// Concatenate the trimmed inputs with a literal `,` between them.
    Raw,
}

/// A prompt split around the point where a LoRA tag goes: the user's text
/// first, the template text last.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssembledPrompt {
    pub head: String,
    pub tail: String,
}

impl AssembledPrompt {
    pub fn text(&self) -> String {
        join_non_empty([self.head.as_str(), self.tail.as_str()])
    }

    pub fn with_tag(&self, tag: &impl Display) -> String {
        let tag = tag.to_string();
        join_non_empty([self.head.as_str(), tag.as_str(), self.tail.as_str()])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler {
    policy: JoinPolicy,
}

impl PromptAssembler {
    pub fn new(policy: JoinPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> JoinPolicy {
        self.policy
    }

    /// Combines the user's prompt, an optional free-text fragment and the
    /// template text.
    pub fn assemble(&self, user: &str, extra: Option<&str>, template: &str) -> AssembledPrompt {
        AssembledPrompt {
            head: self.join(&[user, extra.unwrap_or_default()]),
            tail: self.join(&[template]),
        }
    }

    fn join(&self, parts: &[&str]) -> String {
        match self.policy {
            JoinPolicy::Clauses => parts
                .iter()
                .flat_map(|part| clauses(part))
                .collect::<Vec<_>>()
                .join(","),
            JoinPolicy::Raw => join_non_empty(parts.iter().map(|part| part.trim())),
        }
    }
}

fn clauses(text: &str) -> impl Iterator<Item = &str> {
    text.trim()
        .trim_matches(',')
        .split(',')
        .filter(|clause| !clause.trim().is_empty())
}

fn join_non_empty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
