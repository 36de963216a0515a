//! Prompt construction.
//!
//! Turns a user message, recent history and the active personality into a
//! single backend-ready prompt, either with the default framing or through a
//! named template.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::config::{Configuration, Personality};
use crate::turn::Turn;

/// Number of most recent turns rendered into the context block.
pub const CONTEXT_WINDOW: usize = 5;

/// A named prompt layout.
///
/// `body` may contain `{PERSONALITY}`, `{CONTEXT}`, `{USER_MESSAGE}` and
/// `{CURRENT_DATE}`; any other braces are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub body: Cow<'static, str>,
}

impl PromptTemplate {
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
        body: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            body: body.into(),
        }
    }
}

const DEFAULT_TEMPLATES: &[PromptTemplate] = &[
    PromptTemplate {
        id: Cow::Borrowed("summarize"),
        name: Cow::Borrowed("Summarize"),
        description: Cow::Borrowed("Summarize the given text concisely"),
        body: Cow::Borrowed(
            "{PERSONALITY}\nPlease summarize the following text in 2-3 sentences:\n{USER_MESSAGE}\nSummary:",
        ),
    },
    PromptTemplate {
        id: Cow::Borrowed("explain"),
        name: Cow::Borrowed("Explain Concept"),
        description: Cow::Borrowed("Explain a concept in simple terms"),
        body: Cow::Borrowed(
            "{PERSONALITY}\nExplain the following concept in simple terms that a beginner could understand:\n{USER_MESSAGE}\nExplanation:",
        ),
    },
    PromptTemplate {
        id: Cow::Borrowed("creative_story"),
        name: Cow::Borrowed("Creative Story"),
        description: Cow::Borrowed("Generate a creative story"),
        body: Cow::Borrowed(
            "{PERSONALITY}\nWrite a creative short story based on the following prompt:\n{USER_MESSAGE}\nStory:",
        ),
    },
];

/// The built-in template catalog.
pub fn default_templates() -> &'static [PromptTemplate] {
    DEFAULT_TEMPLATES
}

/// One-sentence framing for each personality.
pub fn personality_preamble(personality: Personality) -> &'static str {
    match personality {
        Personality::Friendly => "You are a friendly and helpful assistant.",
        Personality::Professional => "You are a professional and concise assistant.",
        Personality::Creative => "You are a creative and imaginative assistant.",
        Personality::Technical => {
            "You are a technical expert who provides detailed explanations."
        }
        Personality::Humorous => "You are a witty assistant who uses humor appropriately.",
    }
}

/// Render the last [`CONTEXT_WINDOW`] turns, oldest first.
///
/// Returns an empty string for an empty history.
pub fn context_block(history: &[Turn]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let start = history.len().saturating_sub(CONTEXT_WINDOW);
    let lines = history[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!("Context:\n{}", lines)
}

/// Build the prompt for `user_message`, stamping `{CURRENT_DATE}` with now.
pub fn build_prompt(
    user_message: &str,
    history: &[Turn],
    config: &Configuration,
    template: Option<&PromptTemplate>,
) -> String {
    build_prompt_at(user_message, history, config, template, Utc::now())
}

/// Build the prompt with an explicit timestamp for `{CURRENT_DATE}`.
pub fn build_prompt_at(
    user_message: &str,
    history: &[Turn],
    config: &Configuration,
    template: Option<&PromptTemplate>,
    now: DateTime<Utc>,
) -> String {
    let preamble = personality_preamble(config.personality);
    let context = context_block(history);

    match template {
        None => {
            let mut prompt = String::with_capacity(
                preamble.len() + context.len() + user_message.len() + 24,
            );
            prompt.push_str(preamble);
            prompt.push('\n');
            if !context.is_empty() {
                prompt.push_str(&context);
                prompt.push('\n');
            }
            prompt.push_str("User: ");
            prompt.push_str(user_message);
            prompt.push_str("\nAssistant:");
            prompt
        }
        Some(template) => {
            let date = now.to_rfc3339_opts(SecondsFormat::Secs, true);
            substitute(&template.body, |name| match name {
                "PERSONALITY" => Some(preamble),
                "CONTEXT" => Some(context.as_str()),
                "USER_MESSAGE" => Some(user_message),
                "CURRENT_DATE" => Some(date.as_str()),
                _ => None,
            })
        }
    }
}

/// Replace `{NAME}` placeholders in a single pass over `body`.
///
/// Substituted text is never rescanned, so a user message containing a
/// placeholder is inserted literally. Unknown placeholders stay verbatim.
fn substitute<'a>(body: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) => match lookup(&after[..close]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
