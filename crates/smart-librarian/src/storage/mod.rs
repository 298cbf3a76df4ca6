pub mod lance_store;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

pub use lance_store::LanceStore;
pub use memory::MemoryStore;

/// One embedded book as stored in the similarity store.
#[derive(Debug, Clone)]
pub struct BookRow {
    pub title: String,
    pub summary: String,
    /// Position of first ingestion; breaks score ties.
    pub ordinal: u32,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct StoreHit {
    pub title: String,
    pub summary: String,
    pub ordinal: u32,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub collection_name: String,
    pub persist_directory: String,
}

/// Nearest-neighbour backend keyed by title.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Insert rows, replacing any existing row with the same title.
    async fn upsert(&self, rows: Vec<BookRow>) -> Result<()>;

    /// Up to `limit` hits by cosine similarity. Order is not guaranteed.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<StoreHit>>;

    async fn count(&self) -> Result<usize>;

    /// Title → ordinal for every stored row.
    async fn ordinals(&self) -> Result<HashMap<String, u32>>;

    async fn clear(&self) -> Result<()>;

    fn info(&self) -> StoreInfo;
}
