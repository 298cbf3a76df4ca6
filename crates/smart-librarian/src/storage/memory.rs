use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{BookRow, SimilarityStore, StoreHit, StoreInfo};
use crate::embeddings::cosine_similarity;

/// Brute-force in-process store. Nothing is persisted.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<BookRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SimilarityStore for MemoryStore {
    async fn upsert(&self, rows: Vec<BookRow>) -> Result<()> {
        let mut stored = self.rows.write();
        for row in rows {
            match stored.iter_mut().find(|r| r.title == row.title) {
                Some(existing) => *existing = row,
                None => stored.push(row),
            }
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<StoreHit>> {
        let stored = self.rows.read();
        let mut hits: Vec<StoreHit> = stored
            .iter()
            .map(|row| StoreHit {
                title: row.title.clone(),
                summary: row.summary.clone(),
                ordinal: row.ordinal,
                score: cosine_similarity(query, &row.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().len())
    }

    async fn ordinals(&self) -> Result<HashMap<String, u32>> {
        Ok(self
            .rows
            .read()
            .iter()
            .map(|r| (r.title.clone(), r.ordinal))
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.rows.write().clear();
        Ok(())
    }

    fn info(&self) -> StoreInfo {
        StoreInfo {
            collection_name: "book_summaries".to_string(),
            persist_directory: ":memory:".to_string(),
        }
    }
}
