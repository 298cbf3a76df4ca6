use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::GenerationConfig;
use crate::orchestrator::PipelineSettings;
use crate::tool_loop::ToolLoopConfig;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const API_KEY_PLACEHOLDER: &str = "your_openai_api_key_here";
const MIN_API_KEY_LEN: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarianConfig {
    pub corpus_path: PathBuf,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub conversation: ConversationConfig,
    pub tools: ToolsConfig,
    pub filter: FilterConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Lance,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub collection: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Trailing turns sent to the model.
    pub window: usize,
    /// Turns kept per server-side session.
    pub session_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub max_tool_rounds: usize,
    pub tool_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub extra_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl LibrarianConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.retrieval.top_k == 0 {
            return Err("retrieval.top_k must be > 0".into());
        }
        if self.conversation.window == 0 {
            return Err("conversation.window must be > 0".into());
        }
        if self.conversation.session_capacity == 0 {
            return Err("conversation.session_capacity must be > 0".into());
        }
        if self.tools.max_tool_rounds == 0 {
            return Err("tools.max_tool_rounds must be > 0".into());
        }
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if self.embedding.timeout_secs == 0
            || self.llm.request_timeout_secs == 0
            || self.llm.connect_timeout_secs == 0
            || self.tools.tool_timeout_secs == 0
        {
            return Err("timeouts must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err("llm.temperature must be in [0.0, 2.0]".into());
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err("vector_store.collection must not be empty".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SMART_LIBRARIAN_CORPUS` / `SMART_LIBRARIAN_PORT` overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        if let Ok(corpus) = std::env::var("SMART_LIBRARIAN_CORPUS") {
            self.corpus_path = PathBuf::from(corpus);
        }
        if let Ok(port) = std::env::var("SMART_LIBRARIAN_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| format!("Invalid SMART_LIBRARIAN_PORT '{}': {}", port, e))?;
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            top_k: self.retrieval.top_k,
            history_window: self.conversation.window,
            tool_loop: ToolLoopConfig {
                max_rounds: self.tools.max_tool_rounds,
                request_timeout: Duration::from_secs(self.llm.request_timeout_secs),
                tool_timeout: Duration::from_secs(self.tools.tool_timeout_secs),
            },
        }
    }

    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
        }
    }
}

/// Reject missing or placeholder API keys before any request is made.
pub fn check_api_key(key: Option<&str>) -> Result<String, String> {
    let key = key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| format!("{} not found in environment variables", API_KEY_ENV))?;
    if key == API_KEY_PLACEHOLDER || key.len() < MIN_API_KEY_LEN {
        return Err(format!(
            "Please replace the placeholder {} with your actual API key (current length: {} characters)",
            API_KEY_ENV,
            key.len()
        ));
    }
    Ok(key.to_string())
}

impl Default for LibrarianConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/book_summaries.txt"),
            vector_store: VectorStoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            conversation: ConversationConfig::default(),
            tools: ToolsConfig::default(),
            filter: FilterConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smart-librarian")
            .join("lance_data");
        Self {
            backend: StoreBackend::Lance,
            path,
            collection: "book_summaries".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            connect_timeout_secs: 15,
            request_timeout_secs: 60,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            window: 6,
            session_capacity: 20,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 3,
            tool_timeout_secs: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
        }
    }
}
