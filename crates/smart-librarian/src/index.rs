//! Embedding-backed similarity index over the book corpus.

use std::sync::Arc;

use crate::embeddings::{validate_embedding, Embedder};
use crate::error::{LibrarianError, Result};
use crate::storage::{BookRow, SimilarityStore, StoreHit, StoreInfo};
use crate::types::{snippet, BookRecord, RetrievalCandidate};

/// Extra neighbours fetched per requested slot so score ties at the cut-off
/// are resolved by ordinal rather than by store order. A tie that spans the
/// whole over-fetch triggers a second search over every row.
const CANDIDATE_MULTIPLIER: usize = 3;

pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn SimilarityStore>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn SimilarityStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed and upsert every record. Titles already present keep their
    /// ordinal; new titles are appended after the current maximum.
    pub async fn ingest(&self, records: &[BookRecord]) -> Result<()> {
        let existing = self
            .store
            .ordinals()
            .await
            .map_err(|e| LibrarianError::Ingest(format!("{:#}", e)))?;
        let mut next_ordinal = existing.values().max().map(|m| m + 1).unwrap_or(0);

        let dimension = self.embedder.dimension();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let vector = self
                .embedder
                .embed(&record.embedding_text())
                .await
                .and_then(|v| validate_embedding(&v, dimension).map(|_| v))
                .map_err(|e| {
                    LibrarianError::Ingest(format!("embedding '{}': {:#}", record.title, e))
                })?;

            let ordinal = match existing.get(&record.title) {
                Some(&ordinal) => ordinal,
                None => match rows.iter().find(|r: &&BookRow| r.title == record.title) {
                    Some(row) => row.ordinal,
                    None => {
                        let ordinal = next_ordinal;
                        next_ordinal += 1;
                        ordinal
                    }
                },
            };
            // Later duplicates in the same batch replace earlier ones.
            rows.retain(|r: &BookRow| r.title != record.title);
            rows.push(BookRow {
                title: record.title.clone(),
                summary: record.summary.clone(),
                ordinal,
                vector,
            });
            tracing::debug!(title = %record.title, ordinal, "Embedded book");
        }

        let count = rows.len();
        self.store
            .upsert(rows)
            .await
            .map_err(|e| LibrarianError::Ingest(format!("{:#}", e)))?;
        tracing::info!(count, embedder = self.embedder.name(), "Ingested books into vector index");
        Ok(())
    }

    /// Top-`k` candidates by descending similarity; ties keep corpus order.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        if k == 0 {
            return Err(LibrarianError::Retrieval("k must be greater than zero".into()));
        }

        let vector = self
            .embedder
            .embed(text)
            .await
            .and_then(|v| validate_embedding(&v, self.embedder.dimension()).map(|_| v))
            .map_err(|e| LibrarianError::Retrieval(format!("{:#}", e)))?;
        if vector.iter().all(|v| *v == 0.0) {
            return Ok(Vec::new());
        }

        let limit = k.saturating_mul(CANDIDATE_MULTIPLIER);
        let mut hits = self.ranked_hits(&vector, limit).await?;
        if hits.len() == limit && hits[k - 1].score == hits[limit - 1].score {
            let total = self
                .store
                .count()
                .await
                .map_err(|e| LibrarianError::Retrieval(format!("{:#}", e)))?;
            if total > limit {
                tracing::debug!(limit, total, "Score tie spans the candidate window, widening search");
                hits = self.ranked_hits(&vector, total).await?;
            }
        }
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|hit| RetrievalCandidate {
                snippet: snippet(&hit.summary),
                title: hit.title,
                similarity_score: hit.score,
            })
            .collect())
    }

    /// Store hits ordered by (score desc, ordinal asc).
    async fn ranked_hits(&self, vector: &[f32], limit: usize) -> Result<Vec<StoreHit>> {
        let mut hits = self
            .store
            .search(vector, limit)
            .await
            .map_err(|e| LibrarianError::Retrieval(format!("{:#}", e)))?;
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        Ok(hits)
    }

    pub async fn count(&self) -> anyhow::Result<usize> {
        self.store.count().await
    }

    pub async fn reset(&self) -> anyhow::Result<()> {
        self.store.clear().await
    }

    pub fn info(&self) -> StoreInfo {
        self.store.info()
    }
}
