//! Config loading and component wiring.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use smart_librarian::config::{check_api_key, EmbeddingProvider, StoreBackend, API_KEY_ENV};
use smart_librarian::{
    ChatModel, ContentFilter, Embedder, HashingEmbedder, LanceStore, LibrarianConfig, Library,
    MemoryStore, OpenAIChatModel, OpenAIEmbedder, Orchestrator, SimilarityStore, VectorIndex,
};

use crate::state::AppState;

pub const CONFIG_ENV: &str = "SMART_LIBRARIAN_CONFIG";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

/// Defaults, then the optional config file, then env overrides.
pub fn load_config() -> Result<LibrarianConfig> {
    let mut config = match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "Loading config file");
            LibrarianConfig::from_file(&path).map_err(anyhow::Error::msg)?
        }
        Err(_) => LibrarianConfig::default(),
    };
    config.apply_env_overrides().map_err(anyhow::Error::msg)?;
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

pub fn api_key_from_env() -> Result<String> {
    check_api_key(std::env::var(API_KEY_ENV).ok().as_deref()).map_err(anyhow::Error::msg)
}

pub fn build_embedder(config: &LibrarianConfig, api_key: &str) -> Result<Arc<dyn Embedder>> {
    let embedding = &config.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::new(
            embedding.endpoint.clone(),
            api_key,
            embedding.model.clone(),
            embedding.dimension,
            Duration::from_secs(embedding.timeout_secs),
        )?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(embedding.dimension)),
    };
    Ok(embedder)
}

pub async fn build_store(config: &LibrarianConfig) -> Result<Arc<dyn SimilarityStore>> {
    let store = &config.vector_store;
    let backend: Arc<dyn SimilarityStore> = match store.backend {
        StoreBackend::Lance => Arc::new(
            LanceStore::new(&store.path, &store.collection, config.embedding.dimension)
                .await
                .with_context(|| format!("Failed to open vector store at {}", store.path.display()))?,
        ),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(backend)
}

pub fn build_model(config: &LibrarianConfig, api_key: &str) -> Result<Arc<dyn ChatModel>> {
    let llm = &config.llm;
    let model = OpenAIChatModel::new(
        llm.endpoint.clone(),
        api_key,
        llm.model.clone(),
        config.generation(),
        Duration::from_secs(llm.connect_timeout_secs),
        Duration::from_secs(llm.request_timeout_secs),
    )?;
    Ok(Arc::new(model))
}

/// Ingest the corpus and assemble the server state. Any failure here aborts
/// startup before the listener binds.
pub async fn build_state(
    config: LibrarianConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn SimilarityStore>,
    model: Arc<dyn ChatModel>,
) -> Result<AppState> {
    let index = VectorIndex::new(embedder, store);
    let library = Library::load(&config.corpus_path, index)
        .await
        .with_context(|| format!("Failed to initialise library from {}", config.corpus_path.display()))?;

    let info = library.database_info().await?;
    tracing::info!(
        books = info.document_count,
        collection = %info.collection_name,
        "Database initialized"
    );

    let filter = ContentFilter::new(&config.filter.extra_terms);
    let orchestrator = Orchestrator::new(filter, model, config.pipeline_settings());
    let provider = orchestrator.model_info();
    tracing::info!(
        provider = %provider.name,
        model = %provider.model,
        supports_functions = provider.supports_functions,
        "Generation provider ready"
    );
    Ok(AppState::new(library, orchestrator, config))
}
