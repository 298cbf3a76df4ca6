//! Recommendation pipeline: filter → retrieve → prompt → bounded tool loop.
//!
//! Every request walks the stages below. Failures never escape `chat`; they
//! become a `ChatResponse` with `success = false`.
//!
//! ```text
//! Received → Filtering → Blocked
//!                      → Retrieving → Prompting → AwaitingModel
//!                                   ↺ ToolRequested → ToolExecuting
//!                                   → Complete | Failed
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::corpus::Catalog;
use crate::filter::ContentFilter;
use crate::library::Library;
use crate::llm::{ChatMessage, ChatModel, ProviderInfo};
use crate::session::history_window;
use crate::tool_loop::{run_tool_loop, ToolLoopConfig};
use crate::types::{ChatResponse, ConversationTurn, RetrievalCandidate, Role};

const PROMPT_TITLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Filtering,
    Blocked,
    Retrieving,
    Prompting,
    AwaitingModel,
    ToolRequested,
    ToolExecuting,
    Complete,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Filtering => "filtering",
            Stage::Blocked => "blocked",
            Stage::Retrieving => "retrieving",
            Stage::Prompting => "prompting",
            Stage::AwaitingModel => "awaiting_model",
            Stage::ToolRequested => "tool_requested",
            Stage::ToolExecuting => "tool_executing",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Candidates retrieved per request.
    pub top_k: usize,
    /// Trailing history turns sent to the model.
    pub history_window: usize,
    pub tool_loop: ToolLoopConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            history_window: 6,
            tool_loop: ToolLoopConfig::default(),
        }
    }
}

pub struct Orchestrator {
    filter: ContentFilter,
    model: Arc<dyn ChatModel>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(filter: ContentFilter, model: Arc<dyn ChatModel>, settings: PipelineSettings) -> Self {
        Self {
            filter,
            model,
            settings,
        }
    }

    /// Provider name and model serving generation.
    pub fn model_info(&self) -> ProviderInfo {
        self.model.info()
    }

    /// Answer one message. `history` is the caller's conversation so far.
    pub async fn chat(
        &self,
        library: &Library,
        message: &str,
        history: &[ConversationTurn],
    ) -> ChatResponse {
        let started = Instant::now();
        tracing::debug!(stage = %Stage::Received, chars = message.len(), "Chat request");

        tracing::debug!(stage = %Stage::Filtering, "Classifying message");
        let verdict = self.filter.classify(message);
        if verdict.blocked {
            tracing::info!(
                stage = %Stage::Blocked,
                terms = verdict.matched_terms.len(),
                "Message blocked by content filter"
            );
            return ChatResponse::blocked(self.filter.refusal(message));
        }

        tracing::debug!(stage = %Stage::Retrieving, k = self.settings.top_k, "Querying vector index");
        let candidates = match library.index().query(message, self.settings.top_k).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Retrieval failed, continuing without candidates");
                Vec::new()
            }
        };

        tracing::debug!(stage = %Stage::Prompting, candidates = candidates.len(), "Building prompt");
        let mut messages = build_messages(
            library.catalog(),
            history_window(history, self.settings.history_window),
            message,
            &candidates,
        );
        let schemas = library.tools().schemas();

        match run_tool_loop(
            self.model.as_ref(),
            library.tools(),
            &mut messages,
            &schemas,
            &self.settings.tool_loop,
        )
        .await
        {
            Ok(result) => {
                tracing::info!(
                    stage = %Stage::Complete,
                    tool_calls = result.function_calls.len(),
                    model_calls = result.model_calls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Chat request answered"
                );
                ChatResponse::answered(result.content, result.function_calls, candidates)
            }
            Err(e) => {
                tracing::error!(stage = %Stage::Failed, error = %e, "Chat request failed");
                ChatResponse::failed(e)
            }
        }
    }
}

pub fn system_prompt(catalog: &Catalog) -> String {
    let titles: Vec<&str> = catalog.titles().take(PROMPT_TITLE_LIMIT).collect();
    let more = if catalog.len() > titles.len() {
        ", and more"
    } else {
        ""
    };
    format!(
        "You are a smart, friendly librarian who helps readers find their next book.\n\
         \n\
         You can:\n\
         1. Read the relevant books retrieved from the library database for each question.\n\
         2. Call get_summary_by_title to fetch the full summary of a book by its exact title.\n\
         \n\
         Guidelines:\n\
         - Recommend specific books from the library, not general suggestions.\n\
         - After recommending a book, call get_summary_by_title with its exact title to give details.\n\
         - When the reader asks about a specific title, call get_summary_by_title for it.\n\
         - If a lookup says the book is unavailable, tell the reader and suggest another title.\n\
         - Be conversational and ask follow-up questions about what they enjoy.\n\
         \n\
         Books in the library include: {}{}.",
        titles.join(", "),
        more
    )
}

pub fn render_candidates(candidates: &[RetrievalCandidate]) -> String {
    if candidates.is_empty() {
        return "No relevant books found in the database.".to_string();
    }
    let mut context = String::from("Relevant books from the database:\n\n");
    for c in candidates {
        context.push_str(&format!(
            "**{}**\nSummary: {}\nRelevance Score: {:.2}\n\n",
            c.title, c.snippet, c.similarity_score
        ));
    }
    context
}

/// System prompt, trailing history, then the user turn carrying retrieved context.
pub fn build_messages(
    catalog: &Catalog,
    history: &[ConversationTurn],
    message: &str,
    candidates: &[RetrievalCandidate],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt(catalog)));
    for turn in history {
        messages.push(match turn.role {
            Role::User => ChatMessage::user(&turn.content),
            Role::Assistant => ChatMessage::assistant(&turn.content),
        });
    }
    messages.push(ChatMessage::user(format!(
        "User query: {}\n\n{}\nBased on the relevant books above, please provide a helpful response and recommendation.",
        message,
        render_candidates(candidates)
    )));
    messages
}
