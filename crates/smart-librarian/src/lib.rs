pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod filter;
pub mod http;
pub mod index;
pub mod library;
pub mod llm;
pub mod orchestrator;
pub mod session;
pub mod storage;
pub mod tool_loop;
pub mod tools;
pub mod types;

// Re-export primary types for convenience
pub use config::LibrarianConfig;
pub use corpus::{load_corpus, parse_corpus, Catalog};
pub use error::{CorpusError, LibrarianError};
pub use filter::{ContentFilter, FilterVerdict};
pub use index::VectorIndex;
pub use library::{DatabaseInfo, Library};
pub use orchestrator::{Orchestrator, PipelineSettings};
pub use session::SessionStore;
pub use types::{
    BookRecord, ChatResponse, ConversationTurn, FunctionCall, RetrievalCandidate, Role,
};

// Re-export provider types
pub use embeddings::{Embedder, HashingEmbedder, OpenAIEmbedder};
pub use llm::{ChatModel, GenerationConfig, OpenAIChatModel, ProviderInfo, ScriptedModel};
pub use storage::{LanceStore, MemoryStore, SimilarityStore};
