//! A provider that replays a fixed script of responses. Used for offline runs
//! and for exercising the tool loop without a hosted model.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use super::{ChatMessage, ChatModel, ModelResponse, ProviderInfo, ToolCall, ToolSchema};

enum Script {
    /// Pop responses in order; error when exhausted.
    Queue(VecDeque<Result<ModelResponse, String>>),
    /// Every call returns the same response.
    Repeat(ModelResponse),
}

pub struct ScriptedModel {
    script: Mutex<Script>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    /// `Err` entries are returned as provider errors.
    pub fn from_results(responses: Vec<Result<ModelResponse, String>>) -> Self {
        Self {
            script: Mutex::new(Script::Queue(responses.into())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            script: Mutex::new(Script::Repeat(response)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for a single tool request with fresh call id.
    pub fn tool_call(name: &str, arguments: serde_json::Value) -> ModelResponse {
        ModelResponse::ToolCalls(vec![ToolCall {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }])
    }

    /// Number of chat calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Message lists received, in call order.
    pub fn received(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, messages: &[ChatMessage], _tools: &[ToolSchema]) -> Result<ModelResponse> {
        self.calls.lock().push(messages.to_vec());
        match &mut *self.script.lock() {
            Script::Repeat(response) => Ok(response.clone()),
            Script::Queue(queue) => match queue.pop_front() {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("scripted model has no more responses")),
            },
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "scripted".to_string(),
            model: "scripted".to_string(),
            supports_functions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_exhausted() {
        let model = ScriptedModel::new(vec![ModelResponse::Content("hi".into())]);
        let messages = vec![ChatMessage::user("hello")];
        assert_eq!(
            model.chat(&messages, &[]).await.unwrap(),
            ModelResponse::Content("hi".into())
        );
        assert!(model.chat(&messages, &[]).await.is_err());
        assert_eq!(model.call_count(), 2);
        assert_eq!(model.received()[0], messages);
    }

    #[tokio::test]
    async fn test_repeating() {
        let model = ScriptedModel::repeating(ScriptedModel::tool_call(
            "get_summary_by_title",
            serde_json::json!({"title": "Dune"}),
        ));
        for _ in 0..5 {
            assert!(matches!(
                model.chat(&[], &[]).await.unwrap(),
                ModelResponse::ToolCalls(_)
            ));
        }
    }
}
