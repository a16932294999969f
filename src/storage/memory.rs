//! Brute-force in-memory vector index.
//!
//! Used by tests and small single-process deployments; the QnA pattern set is
//! a few hundred rows, well inside linear-scan territory. Implements the same
//! replace-all contract as the LanceDB backend.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::{CollectionConfig, DistanceMetric};
use crate::types::VectorRecord;

use super::VectorIndex;

#[derive(Default)]
pub struct MemoryIndex {
    collections: DashMap<String, Vec<VectorRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => {
            let denom = norm(a) * norm(b);
            if denom == 0.0 {
                2.0
            } else {
                1.0 - dot(a, b) / denom
            }
        }
        DistanceMetric::L2 => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
        // Match LanceDB's convention: negated dot product, so that smaller
        // is closer for all metrics.
        DistanceMetric::Dot => -dot(a, b),
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn replace(
        &self,
        collection: &CollectionConfig,
        records: Vec<VectorRecord>,
    ) -> Result<usize> {
        let count = records.len();
        self.collections.insert(collection.name.clone(), records);
        Ok(count)
    }

    async fn search(
        &self,
        collection: &CollectionConfig,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(VectorRecord, f32)>> {
        let Some(records) = self.collections.get(&collection.name) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(VectorRecord, f32)> = records
            .iter()
            .filter(|r| r.vector.len() == query.len())
            .map(|r| (r.clone(), distance(collection.metric, query, &r.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collections.get(collection).map_or(0, |r| r.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssistConfig;
    use crate::types::DocMetadata;

    fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            text: id.into(),
            vector,
            metadata: DocMetadata::default(),
            created_at: 0,
        }
    }

    fn qna_collection() -> CollectionConfig {
        let mut c = AssistConfig::default().qna_collection().unwrap().clone();
        c.dimension = 2;
        c
    }

    #[tokio::test]
    async fn nearest_vector_comes_back_first() {
        let index = MemoryIndex::new();
        let collection = qna_collection();
        index
            .replace(
                &collection,
                vec![record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        let hits = index.search(&collection, &[0.9, 0.1], 2).await.unwrap();
        assert_eq!(hits[0].0.id, "a");
        assert!(hits[0].1 < hits[1].1);
    }

    #[tokio::test]
    async fn replace_is_full_refresh() {
        let index = MemoryIndex::new();
        let collection = qna_collection();
        index
            .replace(&collection, vec![record("old", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .replace(&collection, vec![record("new", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.count(&collection.name).await.unwrap(), 1);
        let hits = index.search(&collection, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "new");
    }

    #[tokio::test]
    async fn mismatched_row_dimensions_are_skipped() {
        let index = MemoryIndex::new();
        let collection = qna_collection();
        index
            .replace(
                &collection,
                vec![record("ok", vec![1.0, 0.0]), record("bad", vec![1.0])],
            )
            .await
            .unwrap();

        let hits = index.search(&collection, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "ok");
    }
}
