//! Keyword-based intent detection for the Aria assistant.
//!
//! Matches incoming transcript text against fixed keyword lists for a small
//! enumerated set of intents. First matching intent wins; there is no
//! scoring, no ambiguity resolution, and no fallback chaining beyond the
//! "no intent" case. Detection is deterministic: the same input text always
//! yields the same result for a given keyword table.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Coarse category of a user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Weather lookup for a location.
    Weather,
    /// Web search.
    Search,
    /// Send an email.
    Email,
    /// Fetch the user's stored context.
    Context,
}

impl Intent {
    /// Returns the wire label for this intent.
    pub fn label(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Search => "search",
            Self::Email => "email",
            Self::Context => "context",
        }
    }
}

/// Result of a successful keyword match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMatch {
    /// The matched intent.
    pub intent: Intent,
    /// The keyword that triggered the match.
    pub keyword: String,
    /// Argument extracted from the utterance, when one could be found
    /// (a location for weather, a query for search).
    pub argument: Option<String>,
}

/// One intent with its trigger keywords.
struct KeywordRow {
    intent: Intent,
    keywords: &'static [&'static str],
}

/// Fixed keyword table. Row order defines match priority.
const KEYWORD_TABLE: &[KeywordRow] = &[
    KeywordRow {
        intent: Intent::Weather,
        keywords: &["weather", "temperature", "forecast", "rain", "sunny"],
    },
    KeywordRow {
        intent: Intent::Search,
        keywords: &["search", "find", "look up", "what is", "who is"],
    },
    KeywordRow {
        intent: Intent::Email,
        keywords: &["email", "send message", "send email", "mail"],
    },
    KeywordRow {
        intent: Intent::Context,
        keywords: &["context", "history", "previous", "remember"],
    },
];

fn location_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:in|for|at)\s+([a-zA-Z][a-zA-Z .'\-]*)").expect("valid regex")
    })
}

/// Detects the intent of an utterance.
///
/// Keywords are matched as case-insensitive substrings, in table order.
/// Returns `None` when no keyword matches.
pub fn detect_intent(text: &str) -> Option<IntentMatch> {
    let lowered = text.to_lowercase();

    for row in KEYWORD_TABLE {
        for keyword in row.keywords {
            if lowered.contains(keyword) {
                return Some(IntentMatch {
                    intent: row.intent,
                    keyword: (*keyword).to_string(),
                    argument: extract_argument(row.intent, text, keyword),
                });
            }
        }
    }

    None
}

/// Extracts the intent argument from the utterance.
///
/// Weather: the place name following "in"/"for"/"at" ("weather in Nairobi
/// today" → "Nairobi"). Search: everything after the matched keyword
/// ("search rust async traits" → "rust async traits"). Other intents carry
/// no argument; the handler asks a follow-up question instead.
fn extract_argument(intent: Intent, text: &str, keyword: &str) -> Option<String> {
    match intent {
        Intent::Weather => {
            let captures = location_pattern().captures(text)?;
            let place = captures.get(1)?.as_str();
            // Trailing words like "today" or "right now" belong to the
            // utterance, not the place name.
            let trimmed = place
                .split_whitespace()
                .take_while(|w| {
                    !matches!(
                        w.to_lowercase().as_str(),
                        "today" | "tomorrow" | "now" | "right" | "please" | "currently"
                    )
                })
                .collect::<Vec<_>>()
                .join(" ");
            let trimmed = trimmed.trim_matches(|c: char| c.is_ascii_punctuation());
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Intent::Search => {
            let lowered = text.to_lowercase();
            let start = lowered.find(keyword)? + keyword.len();
            let rest = text[start..]
                .trim_start_matches([':', ',', ' '])
                .trim_end_matches(['?', '.', '!', ' ']);
            if rest.is_empty() {
                None
            } else {
                Some(rest.to_string())
            }
        }
        Intent::Email | Intent::Context => None,
    }
}
