//! Bounded tool-calling loop.
//!
//! Sends messages + tool schemas to the model, executes any requested tool
//! calls, feeds results back, and loops until the model produces a final text
//! response. The number of tool rounds is capped; a model that keeps asking
//! for tools past the cap ends the request with `ToolLoopExceeded`.

use std::time::Duration;

use crate::error::LibrarianError;
use crate::llm::{ChatMessage, ChatModel, ModelResponse, ToolCall, ToolSchema};
use crate::orchestrator::Stage;
use crate::tools::{ToolInput, ToolRegistry};
use crate::types::FunctionCall;

#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    /// Tool round-trips allowed before giving up.
    pub max_rounds: usize,
    /// Bound on each generation call, on top of the HTTP client timeout.
    pub request_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            request_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    pub content: String,
    pub function_calls: Vec<FunctionCall>,
    /// Model invocations made, including the final one.
    pub model_calls: usize,
}

pub async fn run_tool_loop(
    model: &dyn ChatModel,
    registry: &ToolRegistry,
    messages: &mut Vec<ChatMessage>,
    tool_schemas: &[ToolSchema],
    config: &ToolLoopConfig,
) -> Result<ToolLoopResult, LibrarianError> {
    let mut function_calls = Vec::new();
    let mut rounds = 0;
    let mut model_calls = 0;

    loop {
        tracing::debug!(stage = %Stage::AwaitingModel, round = rounds, "Tool loop: sending to model");
        model_calls += 1;
        let response = match tokio::time::timeout(
            config.request_timeout,
            model.chat(messages, tool_schemas),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(LibrarianError::Generation(format!("{:#}", e))),
            Err(_) => {
                return Err(LibrarianError::Generation(format!(
                    "request timed out after {}s",
                    config.request_timeout.as_secs()
                )))
            }
        };

        let tool_calls = match response {
            ModelResponse::Content(text) => {
                tracing::debug!(model_calls, "Tool loop: model returned content, done");
                return Ok(ToolLoopResult {
                    content: text,
                    function_calls,
                    model_calls,
                });
            }
            ModelResponse::ToolCalls(tool_calls) => tool_calls,
        };

        if rounds >= config.max_rounds {
            tracing::warn!(
                max = config.max_rounds,
                "Tool loop: model still requesting tools at the round cap"
            );
            return Err(LibrarianError::ToolLoopExceeded { rounds });
        }
        rounds += 1;

        tracing::info!(
            stage = %Stage::ToolRequested,
            round = rounds,
            tools = ?tool_calls.iter().map(|tc| &tc.name).collect::<Vec<_>>(),
            "Tool loop: model requested tool calls"
        );
        messages.push(ChatMessage::assistant_tool_calls(tool_calls.clone()));

        for tc in &tool_calls {
            tracing::debug!(stage = %Stage::ToolExecuting, tool = %tc.name, "Executing tool");
            let (arguments, output) = execute_tool_call(registry, tc, config.tool_timeout).await;
            function_calls.push(FunctionCall {
                name: tc.name.clone(),
                arguments,
                result: output.clone(),
            });
            messages.push(ChatMessage::tool_result(&tc.id, &tc.name, output));
        }
    }
}

/// Runs one call. Every failure becomes text for the model, never an error.
async fn execute_tool_call(
    registry: &ToolRegistry,
    tool_call: &ToolCall,
    timeout: Duration,
) -> (serde_json::Value, String) {
    let parameters: serde_json::Value = match serde_json::from_str(&tool_call.arguments) {
        Ok(value) => value,
        Err(e) => {
            return (
                serde_json::Value::String(tool_call.arguments.clone()),
                format!("Invalid arguments for {}: {}", tool_call.name, e),
            )
        }
    };

    let Some(tool) = registry.get(&tool_call.name) else {
        return (parameters, format!("Unknown function: {}", tool_call.name));
    };

    let input = ToolInput {
        tool_id: tool_call.name.clone(),
        parameters: parameters.clone(),
    };
    let output = match tokio::time::timeout(timeout, tool.execute(input)).await {
        Ok(Ok(result)) => result.output,
        Ok(Err(e)) => format!("Tool execution error: {}", e),
        Err(_) => format!(
            "Tool '{}' timed out after {}s",
            tool_call.name,
            timeout.as_secs()
        ),
    };
    (parameters, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Catalog;
    use crate::llm::ScriptedModel;
    use crate::types::BookRecord;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        ToolRegistry::for_catalog(Arc::new(Catalog::new(vec![BookRecord::new(
            "1984",
            "Big Brother is watching.",
        )])))
    }

    #[tokio::test]
    async fn test_single_round_then_answer() {
        let model = ScriptedModel::new(vec![
            ScriptedModel::tool_call("get_summary_by_title", json!({"title": "1984"})),
            ModelResponse::Content("Read 1984.".into()),
        ]);
        let registry = registry();
        let mut messages = vec![ChatMessage::user("What is 1984?")];

        let result = run_tool_loop(&model, &registry, &mut messages, &registry.schemas(), &ToolLoopConfig::default())
            .await
            .unwrap();

        assert_eq!(result.content, "Read 1984.");
        assert_eq!(result.model_calls, 2);
        assert_eq!(result.function_calls.len(), 1);
        assert_eq!(result.function_calls[0].arguments, json!({"title": "1984"}));
        assert_eq!(result.function_calls[0].result, "Big Brother is watching.");
        // user, assistant tool call, tool result
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content.as_deref(), Some("Big Brother is watching."));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_are_fed_back() {
        let model = ScriptedModel::new(vec![
            ModelResponse::ToolCalls(vec![
                ToolCall { id: "a".into(), name: "search_web".into(), arguments: "{}".into() },
                ToolCall { id: "b".into(), name: "get_summary_by_title".into(), arguments: "{not json".into() },
            ]),
            ModelResponse::Content("Sorry.".into()),
        ]);
        let registry = registry();
        let mut messages = vec![ChatMessage::user("hi")];
        let result = run_tool_loop(&model, &registry, &mut messages, &registry.schemas(), &ToolLoopConfig::default())
            .await
            .unwrap();

        assert_eq!(result.function_calls[0].result, "Unknown function: search_web");
        assert!(result.function_calls[1].result.starts_with("Invalid arguments for get_summary_by_title"));
        assert_eq!(result.function_calls[1].arguments, json!("{not json"));
    }

    #[tokio::test]
    async fn test_cap_terminates_endless_tool_requests() {
        let model = ScriptedModel::repeating(ScriptedModel::tool_call(
            "get_summary_by_title",
            json!({"title": "1984"}),
        ));
        let registry = registry();
        let config = ToolLoopConfig { max_rounds: 3, ..ToolLoopConfig::default() };
        let mut messages = vec![ChatMessage::user("loop")];

        let err = run_tool_loop(&model, &registry, &mut messages, &registry.schemas(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, LibrarianError::ToolLoopExceeded { rounds: 3 }));
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn test_provider_error_is_generation_error() {
        let model = ScriptedModel::from_results(vec![Err("401 invalid api key".into())]);
        let registry = registry();
        let mut messages = vec![ChatMessage::user("hi")];
        let err = run_tool_loop(&model, &registry, &mut messages, &registry.schemas(), &ToolLoopConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LibrarianError::Generation(ref m) if m.contains("401")));
    }

    /// Small LCG so the generated batches are reproducible.
    fn next(state: &mut u64) -> u64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *state >> 33
    }

    fn random_batch(state: &mut u64, round: usize) -> Vec<ToolCall> {
        const NAMES: [&str; 3] = ["get_summary_by_title", "search_web", "recommend_books"];
        const ARGS: [&str; 4] = [r#"{"title": "1984"}"#, r#"{"title": "Dune"}"#, "{}", "{not json"];
        let size = 1 + (next(state) % 3) as usize;
        (0..size)
            .map(|i| ToolCall {
                id: format!("call_{round}_{i}"),
                name: NAMES[(next(state) % 3) as usize].to_string(),
                arguments: ARGS[(next(state) % 4) as usize].to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_cap_holds_for_varied_tool_batches() {
        let registry = registry();
        for seed in 1..=25u64 {
            let mut state = seed;
            let max_rounds = 1 + (next(&mut state) % 4) as usize;
            let batches: Vec<Vec<ToolCall>> =
                (0..max_rounds + 3).map(|round| random_batch(&mut state, round)).collect();
            let executed: usize = batches[..max_rounds].iter().map(|b| 1 + b.len()).sum();

            let model = ScriptedModel::new(batches.into_iter().map(ModelResponse::ToolCalls).collect());
            let config = ToolLoopConfig { max_rounds, ..ToolLoopConfig::default() };
            let mut messages = vec![ChatMessage::user("recommend something")];

            let err = run_tool_loop(&model, &registry, &mut messages, &registry.schemas(), &config)
                .await
                .unwrap_err();
            assert!(
                matches!(err, LibrarianError::ToolLoopExceeded { rounds } if rounds == max_rounds),
                "seed {seed}: {err}"
            );
            assert_eq!(model.call_count(), max_rounds + 1, "seed {seed}");
            assert_eq!(messages.len(), 1 + executed, "seed {seed}");
        }
    }
}
