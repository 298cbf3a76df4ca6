use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const SNIPPET_CHARS: usize = 200;

/// One titled summary from the corpus. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub summary: String,
    pub themes: BTreeSet<String>,
}

impl BookRecord {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        let themes = extract_themes(&summary);
        Self {
            title: title.into(),
            summary,
            themes,
        }
    }

    /// Text handed to the embedding service at ingest time.
    pub fn embedding_text(&self) -> String {
        format!("Title: {}\n{}", self.title, self.summary)
    }

    pub fn snippet(&self) -> String {
        snippet(&self.summary)
    }
}

/// Themes come from a `Main themes: a, b, c` line in the summary body.
fn extract_themes(summary: &str) -> BTreeSet<String> {
    summary
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let lower = line.to_lowercase();
            lower
                .strip_prefix("main themes:")
                .or_else(|| lower.strip_prefix("themes:"))
                .map(str::to_string)
        })
        .flat_map(|rest| {
            rest.split(',')
                .map(|t| t.trim().trim_end_matches('.').to_string())
                .collect::<Vec<_>>()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}…", trimmed[..idx].trim_end()),
        None => trimmed.to_string(),
    }
}

/// A similarity hit produced per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub title: String,
    pub similarity_score: f32,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool invocation made while answering a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: String,
}

/// The structured answer returned for every chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    pub filtered: bool,
    pub function_calls: Vec<FunctionCall>,
    pub search_results: Vec<RetrievalCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn blocked(refusal: impl Into<String>) -> Self {
        Self {
            success: true,
            message: refusal.into(),
            filtered: true,
            function_calls: Vec::new(),
            search_results: Vec::new(),
            error: None,
        }
    }

    pub fn answered(
        message: impl Into<String>,
        function_calls: Vec<FunctionCall>,
        search_results: Vec<RetrievalCandidate>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            filtered: false,
            function_calls,
            search_results,
            error: None,
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        let error = error.to_string();
        Self {
            success: false,
            message: format!(
                "I apologize, but I encountered an error: {}. Please try again.",
                error
            ),
            filtered: false,
            function_calls: Vec::new(),
            search_results: Vec::new(),
            error: Some(error),
        }
    }
}
