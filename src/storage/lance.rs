//! LanceDB-backed vector index. One table per collection; rows carry the
//! document text, its embedding and the serialized metadata blob.

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

use crate::config::{CollectionConfig, DistanceMetric};
use crate::types::{DocMetadata, VectorRecord};

use super::VectorIndex;

pub struct LanceIndex {
    db: lancedb::Connection,
}

impl LanceIndex {
    pub async fn connect(path: &str) -> Result<Self> {
        std::fs::create_dir_all(path).ok();
        let db = lancedb::connect(path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;
        Ok(Self { db })
    }

    fn schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                true,
            ),
            Field::new("metadata_json", DataType::Utf8, false),
            Field::new("created_at", DataType::Int64, false),
        ]))
    }

    fn batch_from_records(
        records: &[VectorRecord],
        dimension: usize,
    ) -> Result<(RecordBatch, Arc<Schema>)> {
        let schema = Self::schema(dimension);

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let metadata_jsons: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(&r.metadata).unwrap_or_else(|_| "{}".to_string()))
            .collect();
        let metadata_refs: Vec<&str> = metadata_jsons.iter().map(|s| s.as_str()).collect();
        let created_ats: Vec<i64> = records.iter().map(|r| r.created_at).collect();

        let flat_vectors: Vec<f32> = records
            .iter()
            .flat_map(|r| r.vector.iter().copied())
            .collect();
        let values = Float32Array::from(flat_vectors);
        let vector_field = Field::new("item", DataType::Float32, true);
        let vector_array = FixedSizeListArray::new(
            Arc::new(vector_field),
            dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        );

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(ids)) as Arc<dyn Array>,
                Arc::new(StringArray::from(texts)),
                Arc::new(vector_array) as Arc<dyn Array>,
                Arc::new(StringArray::from(metadata_refs)),
                Arc::new(Int64Array::from(created_ats)),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok((batch, schema))
    }

    fn distance_type(metric: DistanceMetric) -> lancedb::DistanceType {
        match metric {
            DistanceMetric::Cosine => lancedb::DistanceType::Cosine,
            DistanceMetric::L2 => lancedb::DistanceType::L2,
            DistanceMetric::Dot => lancedb::DistanceType::Dot,
        }
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn replace(
        &self,
        collection: &CollectionConfig,
        records: Vec<VectorRecord>,
    ) -> Result<usize> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&collection.name) {
            self.db.drop_table(&collection.name, &[]).await?;
        }

        if records.is_empty() {
            return Ok(0);
        }

        let len = records.len();
        let (batch, schema) = Self::batch_from_records(&records, collection.dimension)?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.db
            .create_table(&collection.name, Box::new(batches))
            .execute()
            .await
            .with_context(|| format!("Failed to create table '{}'", collection.name))?;

        // LanceDB auto-tunes index structure; the collection's declared HNSW
        // parameters are recorded by the adapter's config snapshot.
        if len >= 1_000 {
            let table = self.db.open_table(&collection.name).execute().await?;
            table
                .create_index(&["vector"], lancedb::index::Index::Auto)
                .execute()
                .await
                .context("Failed to create vector index")?;
            tracing::info!(collection = %collection.name, rows = len, "created vector index");
        }

        tracing::debug!(collection = %collection.name, rows = len, "replaced collection in LanceDB");
        Ok(len)
    }

    async fn search(
        &self,
        collection: &CollectionConfig,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(VectorRecord, f32)>> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&collection.name) {
            return Ok(Vec::new());
        }

        let table = self.db.open_table(&collection.name).execute().await?;
        let results = table
            .query()
            .nearest_to(query)?
            .distance_type(Self::distance_type(collection.metric))
            .limit(k)
            .execute()
            .await
            .context("LanceDB vector search failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(extract_records_from_batches(&batches))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&collection.to_string()) {
            return Ok(0);
        }
        let table = self.db.open_table(collection).execute().await?;
        Ok(table.count_rows(None).await?)
    }
}

fn extract_records_from_batches(batches: &[RecordBatch]) -> Vec<(VectorRecord, f32)> {
    let mut hits = Vec::new();
    for batch in batches {
        let ids = batch
            .column_by_name("id")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let texts = batch
            .column_by_name("text")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let metadata_jsons = batch
            .column_by_name("metadata_json")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let created_ats = batch
            .column_by_name("created_at")
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>());
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let (Some(ids), Some(texts)) = (ids, texts) else {
            continue;
        };

        for i in 0..batch.num_rows() {
            let metadata: DocMetadata = metadata_jsons
                .map(|m| m.value(i))
                .and_then(|json| serde_json::from_str(json).ok())
                .unwrap_or_default();

            hits.push((
                VectorRecord {
                    id: ids.value(i).to_string(),
                    text: texts.value(i).to_string(),
                    // Vectors are not read back on search; the adapter only
                    // needs text + metadata + distance.
                    vector: Vec::new(),
                    metadata,
                    created_at: created_ats.map(|c| c.value(i)).unwrap_or(0),
                },
                distances.map(|d| d.value(i)).unwrap_or(0.0),
            ));
        }
    }
    hits
}
