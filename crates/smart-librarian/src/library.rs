use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::corpus::{load_corpus, Catalog};
use crate::error::{LibrarianError, Result};
use crate::index::VectorIndex;
use crate::tools::ToolRegistry;
use crate::types::BookRecord;

/// The corpus in both of its forms: title lookup and similarity index.
/// Built once, then read-only while serving.
pub struct Library {
    catalog: Arc<Catalog>,
    index: VectorIndex,
    tools: ToolRegistry,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub collection_name: String,
    pub document_count: usize,
    pub persist_directory: String,
}

impl Library {
    /// Replace whatever `index` holds with `records` and build the matching
    /// catalog. The store may persist across runs, so stale titles are dropped.
    pub async fn build(records: Vec<BookRecord>, index: VectorIndex) -> Result<Self> {
        index
            .reset()
            .await
            .map_err(|e| LibrarianError::Ingest(format!("{:#}", e)))?;
        index.ingest(&records).await?;
        let catalog = Arc::new(Catalog::new(records));
        let tools = ToolRegistry::for_catalog(catalog.clone());
        Ok(Self {
            catalog,
            index,
            tools,
        })
    }

    pub async fn load(corpus_path: &Path, index: VectorIndex) -> Result<Self> {
        let records = load_corpus(corpus_path)?;
        Self::build(records, index).await
    }

    /// Replace the corpus in place: clear the index, ingest `records`, swap
    /// the catalog. If ingest fails the previous records are re-ingested and
    /// the old catalog stays in service.
    pub async fn reload(&mut self, records: Vec<BookRecord>) -> Result<()> {
        self.index
            .reset()
            .await
            .map_err(|e| LibrarianError::Ingest(format!("{:#}", e)))?;

        if let Err(e) = self.index.ingest(&records).await {
            tracing::error!(error = %e, "Reload failed, restoring previous corpus");
            if let Err(restore) = self.index.ingest(self.catalog.books()).await {
                tracing::error!(error = %restore, "Failed to restore previous corpus");
            }
            return Err(e);
        }

        self.catalog = Arc::new(Catalog::new(records));
        self.tools = ToolRegistry::for_catalog(self.catalog.clone());
        tracing::info!(books = self.catalog.len(), "Library reloaded");
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn database_info(&self) -> anyhow::Result<DatabaseInfo> {
        let document_count = self.index.count().await?;
        let info = self.index.info();
        Ok(DatabaseInfo {
            collection_name: info.collection_name,
            document_count,
            persist_directory: info.persist_directory,
        })
    }
}
