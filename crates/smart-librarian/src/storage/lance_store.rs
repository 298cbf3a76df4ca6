use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{BookRow, SimilarityStore, StoreHit, StoreInfo};

/// Embedded LanceDB table holding one row per book title.
pub struct LanceStore {
    db: lancedb::Connection,
    dimension: usize,
    table_name: String,
    path: String,
}

impl LanceStore {
    pub async fn new(path: &Path, table_name: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create LanceDB directory {}", path.display()))?;
        let uri = path.to_string_lossy().to_string();
        let db = lancedb::connect(&uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let store = Self {
            db,
            dimension,
            table_name: table_name.to_string(),
            path: uri,
        };

        store.ensure_table().await?;
        tracing::info!(
            path = %store.path,
            table = %store.table_name,
            "LanceDB store ready"
        );
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("title", DataType::Utf8, false),
            Field::new("summary", DataType::Utf8, false),
            Field::new("ordinal", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
        ]))
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&self.table_name) {
            self.db
                .create_empty_table(&self.table_name, self.schema())
                .execute()
                .await
                .context("Failed to create book_summaries table")?;
        }
        Ok(())
    }

    async fn open(&self) -> Result<lancedb::Table> {
        self.db
            .open_table(&self.table_name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table {}", self.table_name))
    }
}

#[async_trait]
impl SimilarityStore for LanceStore {
    async fn upsert(&self, rows: Vec<BookRow>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let table = self.open().await?;

        let len = rows.len();
        let schema = self.schema();
        let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        let summaries: Vec<&str> = rows.iter().map(|r| r.summary.as_str()).collect();
        let ordinals: Vec<u32> = rows.iter().map(|r| r.ordinal).collect();

        let flat_vectors: Vec<f32> = rows.iter().flat_map(|r| r.vector.iter().copied()).collect();
        let values = Float32Array::from(flat_vectors);
        let vector_field = Field::new("item", DataType::Float32, true);
        let vector_array = FixedSizeListArray::try_new(
            Arc::new(vector_field),
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Vector length does not match store dimension")?;

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(titles)) as Arc<dyn Array>,
                Arc::new(StringArray::from(summaries)),
                Arc::new(UInt32Array::from(ordinals)),
                Arc::new(vector_array) as Arc<dyn Array>,
            ],
        )
        .context("Failed to create RecordBatch")?;

        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        // Upsert via merge_insert: title is unique, one commit per batch.
        let mut merge = table.merge_insert(&["title"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(reader).await.context("Failed to upsert books")?;

        tracing::debug!("Upserted {} books into LanceDB", len);
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<StoreHit>> {
        let table = self.open().await?;

        let results = table
            .query()
            .nearest_to(query)?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .context("LanceDB vector search failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(extract_hits_from_batches(&batches))
    }

    async fn count(&self) -> Result<usize> {
        let table = self.open().await?;
        Ok(table.count_rows(None).await?)
    }

    async fn ordinals(&self) -> Result<HashMap<String, u32>> {
        let table = self.open().await?;
        let results = table
            .query()
            .select(lancedb::query::Select::columns(&["title", "ordinal"]))
            .execute()
            .await
            .context("Failed to query ordinals")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        let mut ordinals = HashMap::new();
        for batch in &batches {
            let titles = batch
                .column_by_name("title")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let values = batch
                .column_by_name("ordinal")
                .and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
            if let (Some(titles), Some(values)) = (titles, values) {
                for i in 0..batch.num_rows() {
                    ordinals.insert(titles.value(i).to_string(), values.value(i));
                }
            }
        }
        Ok(ordinals)
    }

    async fn clear(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.table_name) {
            self.db.drop_table(&self.table_name, &[]).await?;
        }
        self.ensure_table().await?;
        tracing::info!(table = %self.table_name, "Cleared LanceDB table");
        Ok(())
    }

    fn info(&self) -> StoreInfo {
        StoreInfo {
            collection_name: self.table_name.clone(),
            persist_directory: self.path.clone(),
        }
    }
}

fn extract_hits_from_batches(batches: &[RecordBatch]) -> Vec<StoreHit> {
    let mut hits = Vec::new();
    for batch in batches {
        let titles = batch.column_by_name("title").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let summaries = batch.column_by_name("summary").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let ordinals = batch.column_by_name("ordinal").and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
        let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let (Some(titles), Some(summaries)) = (titles, summaries) else {
            continue;
        };

        for i in 0..batch.num_rows() {
            let score = distances.map(|d| (1.0 - d.value(i)).max(0.0)).unwrap_or(0.0);
            hits.push(StoreHit {
                title: titles.value(i).to_string(),
                summary: summaries.value(i).to_string(),
                ordinal: ordinals.map(|o| o.value(i)).unwrap_or(u32::MAX),
                score,
            });
        }
    }
    hits
}
