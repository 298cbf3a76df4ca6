//! Tools the generation step may call. The librarian exposes exactly one:
//! `get_summary_by_title`.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::corpus::Catalog;
use crate::error::LibrarianError;
use crate::llm::ToolSchema;

pub const GET_SUMMARY_BY_TITLE: &str = "get_summary_by_title";

/// Input for a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_id: String,
    pub parameters: serde_json::Value,
}

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution was successful
    pub success: bool,
    /// Text fed back to the model
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    fn failed(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait LibrarianTool: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// Parameter schema (JSON Schema format)
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, input: ToolInput) -> Result<ToolResult>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.id().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Exact-title summary lookup over the catalog.
pub struct SummaryLookupTool {
    catalog: Arc<Catalog>,
}

impl SummaryLookupTool {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl LibrarianTool for SummaryLookupTool {
    fn id(&self) -> &str {
        GET_SUMMARY_BY_TITLE
    }

    fn description(&self) -> &str {
        "Get a detailed summary of a book by its exact title. Use this after recommending a book or when a user asks about a specific book."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "The exact title of the book to get the summary for"
                }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolResult> {
        let Some(title) = input.parameters.get("title").and_then(|t| t.as_str()) else {
            return Ok(ToolResult::failed(
                "Missing required string parameter 'title'.",
                "missing title",
            ));
        };

        match self.catalog.get_summary_by_title(title) {
            Ok(summary) => Ok(ToolResult::ok(summary)),
            Err(e @ LibrarianError::NotFound(_)) => Ok(ToolResult::failed(
                self.catalog.not_found_message(title),
                e.to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn LibrarianTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the summary lookup tool for `catalog`.
    pub fn for_catalog(catalog: Arc<Catalog>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SummaryLookupTool::new(catalog)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn LibrarianTool>) {
        self.tools.insert(tool.id().to_string(), tool);
    }

    pub fn get(&self, tool_id: &str) -> Option<Arc<dyn LibrarianTool>> {
        self.tools.get(tool_id).cloned()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookRecord;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            BookRecord::new("1984", "Big Brother is watching."),
            BookRecord::new("The Hobbit", "There and back again."),
        ]))
    }

    fn input(parameters: serde_json::Value) -> ToolInput {
        ToolInput {
            tool_id: GET_SUMMARY_BY_TITLE.to_string(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let tool = SummaryLookupTool::new(catalog());
        let result = tool.execute(input(serde_json::json!({"title": "1984"}))).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Big Brother is watching.");
    }

    #[tokio::test]
    async fn test_lookup_not_found_is_a_result() {
        let tool = SummaryLookupTool::new(catalog());
        let result = tool
            .execute(input(serde_json::json!({"title": "the hobbit"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Sorry, I don't have a detailed summary for 'the hobbit'"));
        assert!(result.output.contains("1984, The Hobbit"));
    }

    #[tokio::test]
    async fn test_lookup_missing_title() {
        let tool = SummaryLookupTool::new(catalog());
        let result = tool.execute(input(serde_json::json!({"name": 3}))).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("missing title"));
    }

    #[test]
    fn test_registry_schema() {
        let registry = ToolRegistry::for_catalog(catalog());
        assert_eq!(registry.len(), 1);
        let schemas = registry.schemas();
        assert_eq!(schemas[0].name, "get_summary_by_title");
        assert_eq!(schemas[0].parameters["required"][0], "title");
        assert_eq!(schemas[0].parameters["properties"]["title"]["type"], "string");
        assert!(registry.get("get_summary_by_title").is_some());
        assert!(registry.get("search_web").is_none());
    }
}
