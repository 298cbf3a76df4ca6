//! OpenAI-compatible chat completions client with tool calling.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{
    ChatMessage, ChatModel, GenerationConfig, ModelResponse, ProviderInfo, ToolCall, ToolSchema,
};
use crate::http::{build_client, describe_send_error, parse_json_response};

pub struct OpenAIChatModel {
    endpoint: String,
    api_key: String,
    model: String,
    generation: GenerationConfig,
    client: Client,
}

impl OpenAIChatModel {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        generation: GenerationConfig,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let model = model.into();
        let client = build_client(connect_timeout, timeout)?;

        tracing::info!(
            endpoint = %endpoint,
            model = %model,
            connect_timeout_secs = connect_timeout.as_secs(),
            timeout_secs = timeout.as_secs(),
            "Creating OpenAIChatModel"
        );

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            model,
            generation,
            client,
        })
    }

    pub(crate) fn format_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                let mut msg = json!({ "role": m.role.as_str() });
                // Assistant tool-call turns must still carry a content key.
                msg["content"] = match m.content {
                    Some(ref content) => json!(content),
                    None => serde_json::Value::Null,
                };
                if let Some(ref calls) = m.tool_calls {
                    msg["tool_calls"] = json!(calls
                        .iter()
                        .map(|tc| json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments,
                            }
                        }))
                        .collect::<Vec<_>>());
                }
                if let Some(ref id) = m.tool_call_id {
                    msg["tool_call_id"] = json!(id);
                }
                if let Some(ref name) = m.name {
                    msg["name"] = json!(name);
                }
                msg
            })
            .collect()
    }

    pub(crate) fn format_tools(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    pub(crate) fn parse_choice(body: &serde_json::Value) -> Result<ModelResponse> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| anyhow::anyhow!("Chat response has no choices"))?;

        if let Some(tool_calls) = choice["tool_calls"].as_array() {
            let calls: Vec<ToolCall> = tool_calls
                .iter()
                .filter_map(|tc| {
                    Some(ToolCall {
                        id: tc["id"].as_str()?.to_string(),
                        name: tc["function"]["name"].as_str()?.to_string(),
                        arguments: tc["function"]["arguments"].as_str()?.to_string(),
                    })
                })
                .collect();
            if !calls.is_empty() {
                return Ok(ModelResponse::ToolCalls(calls));
            }
        }

        let content = choice["content"].as_str().unwrap_or("").to_string();
        Ok(ModelResponse::Content(content))
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolSchema]) -> Result<ModelResponse> {
        let mut request = json!({
            "model": self.model,
            "messages": Self::format_messages(messages),
            "max_tokens": self.generation.max_tokens,
            "temperature": self.generation.temperature,
            "stream": false
        });

        if !tools.is_empty() {
            request["tools"] = json!(Self::format_tools(tools));
            request["tool_choice"] = json!("auto");
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| describe_send_error(&self.endpoint, e))?;

        let body: serde_json::Value = parse_json_response(response, &self.endpoint).await?;
        Self::parse_choice(&body)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "openai".to_string(),
            model: self.model.clone(),
            supports_functions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tool_round_trip_messages() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::assistant_tool_calls(vec![ToolCall {
                id: "call_1".into(),
                name: "get_summary_by_title".into(),
                arguments: r#"{"title":"1984"}"#.into(),
            }]),
            ChatMessage::tool_result("call_1", "get_summary_by_title", "Big Brother"),
        ];
        let formatted = OpenAIChatModel::format_messages(&messages);
        assert_eq!(formatted[0]["role"], "system");
        assert!(formatted[1]["content"].is_null());
        assert_eq!(formatted[1]["tool_calls"][0]["type"], "function");
        assert_eq!(formatted[1]["tool_calls"][0]["function"]["name"], "get_summary_by_title");
        assert_eq!(formatted[2]["role"], "tool");
        assert_eq!(formatted[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_format_tools() {
        let tools = vec![ToolSchema {
            name: "get_summary_by_title".into(),
            description: "d".into(),
            parameters: json!({"type": "object"}),
        }];
        let formatted = OpenAIChatModel::format_tools(&tools);
        assert_eq!(formatted[0]["type"], "function");
        assert_eq!(formatted[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_parse_tool_calls_and_content() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": {"name": "get_summary_by_title", "arguments": "{\"title\":\"Dune\"}"}
                }]
            }}]
        });
        match OpenAIChatModel::parse_choice(&body).unwrap() {
            ModelResponse::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_9");
                assert_eq!(calls[0].arguments, r#"{"title":"Dune"}"#);
            }
            other => panic!("expected tool calls, got {:?}", other),
        }

        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Read Dune."}}]});
        assert_eq!(
            OpenAIChatModel::parse_choice(&body).unwrap(),
            ModelResponse::Content("Read Dune.".into())
        );

        assert!(OpenAIChatModel::parse_choice(&json!({"error": "x"})).is_err());
    }
}
