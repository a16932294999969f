pub mod lance;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{CollectionConfig, DistanceMetric};
use crate::embeddings::EmbeddingProvider;
use crate::error::AssistError;
use crate::types::{IndexedDocument, ScoredDocument, VectorRecord};

pub use lance::LanceIndex;
pub use memory::MemoryIndex;

/// Raw vector backend seam: stores and searches (vector, text, metadata) rows
/// per named collection. Distances are backend-native; the adapter converts
/// them to bounded similarities.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Full-refresh replace of a collection's contents. Collections are a
    /// derived cache of the relational store / source documents, so the
    /// replace-all contract is all the rest of the system needs.
    async fn replace(
        &self,
        collection: &CollectionConfig,
        records: Vec<VectorRecord>,
    ) -> Result<usize>;

    /// Nearest-neighbor search returning (record, raw distance) pairs.
    async fn search(
        &self,
        collection: &CollectionConfig,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(VectorRecord, f32)>>;

    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Convert a backend distance into a similarity clamped to [0, 1].
/// Cosine and dot distances use `1 - d/2`; L2 decays as `1/(1+d)`.
pub fn similarity_from_distance(metric: DistanceMetric, distance: f32) -> f32 {
    let s = match metric {
        DistanceMetric::Cosine | DistanceMetric::Dot => 1.0 - distance / 2.0,
        DistanceMetric::L2 => 1.0 / (1.0 + distance.max(0.0)),
    };
    s.clamp(0.0, 1.0)
}

/// Embedding-aware layer over a [`VectorIndex`].
///
/// Owns the per-collection configuration, validates query vectors before they
/// reach the backend, converts distances to similarities and attaches each
/// collection's threshold to its results. A single collection's retrieval
/// failure never aborts callers fanning out across several collections; it
/// degrades to an empty result and a log line. Embedding model load failures
/// are the exception and propagate to the caller.
pub struct DocumentStoreAdapter {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<EmbeddingProvider>,
    collections: HashMap<String, CollectionConfig>,
    data_dir: PathBuf,
    reindex_guards: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl DocumentStoreAdapter {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<EmbeddingProvider>,
        collections: &[CollectionConfig],
        data_dir: PathBuf,
    ) -> Self {
        Self {
            index,
            embeddings,
            collections: collections
                .iter()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
            data_dir,
            reindex_guards: DashMap::new(),
        }
    }

    pub fn collection(&self, name: &str) -> Result<&CollectionConfig, AssistError> {
        self.collections
            .get(name)
            .ok_or_else(|| AssistError::Configuration(format!("unknown collection '{name}'")))
    }

    /// Embed and replace-all a collection's documents.
    ///
    /// Concurrent reindexes of the same collection serialize behind a
    /// per-collection lock; reads and other collections proceed unblocked
    /// (answers may briefly degrade mid-rebuild).
    pub async fn upsert(
        &self,
        collection_name: &str,
        documents: Vec<IndexedDocument>,
    ) -> Result<usize> {
        let collection = self.collection(collection_name)?.clone();

        let guard = self
            .reindex_guards
            .entry(collection.name.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _held = guard.lock().await;

        let now = chrono::Utc::now().timestamp();
        // Embedding (and a lazy model load behind it, with its retry ladder)
        // is synchronous work; keep it off the async workers.
        let vectors = {
            let embeddings = self.embeddings.clone();
            let model = collection.embedding_model.clone();
            let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
            tokio::task::spawn_blocking(move || {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                embeddings.embed_batch(&model, &refs)
            })
            .await
            .map_err(anyhow::Error::new)??
        };
        let records: Vec<VectorRecord> = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, vector)| VectorRecord {
                id: doc.id,
                text: doc.text,
                vector,
                metadata: doc.metadata,
                created_at: now,
            })
            .collect();

        let count = self.index.replace(&collection, records).await?;
        self.snapshot_collection_config(&collection)?;
        tracing::info!(collection = %collection.name, documents = count, "collection rebuilt");
        Ok(count)
    }

    /// Similarity search over one collection. Fail-soft for retrieval-side
    /// failures (unknown collection, dimension mismatch, non-finite query
    /// vector, backend error): those log and return an empty result. An
    /// embedding model load failure propagates instead; "the model is down"
    /// must not read as "no relevant documents" to the answer boundary.
    pub async fn search(
        &self,
        collection_name: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, AssistError> {
        match self.try_search(collection_name, query_text, top_k).await {
            Ok(hits) => Ok(hits),
            Err(e) => match e.downcast::<AssistError>() {
                Ok(err @ AssistError::ModelLoad { .. }) => Err(err),
                Ok(err) => {
                    tracing::warn!(
                        collection = %collection_name,
                        error = %err,
                        "search degraded to empty result"
                    );
                    Ok(Vec::new())
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %collection_name,
                        error = %e,
                        "search degraded to empty result"
                    );
                    Ok(Vec::new())
                }
            },
        }
    }

    async fn try_search(
        &self,
        collection_name: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let collection = self.collection(collection_name)?.clone();
        let query = {
            let embeddings = self.embeddings.clone();
            let model = collection.embedding_model.clone();
            let text = query_text.to_string();
            tokio::task::spawn_blocking(move || embeddings.embed_query(&model, &text))
                .await
                .map_err(anyhow::Error::new)??
        };

        if query.len() != collection.dimension {
            return Err(AssistError::Retrieval {
                collection: collection.name.clone(),
                reason: format!(
                    "query dimension {} does not match collection dimension {}",
                    query.len(),
                    collection.dimension
                ),
            }
            .into());
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(AssistError::Retrieval {
                collection: collection.name.clone(),
                reason: "query embedding contains non-finite values".into(),
            }
            .into());
        }

        let raw = self.index.search(&collection, &query, top_k).await?;
        let mut hits: Vec<ScoredDocument> = raw
            .into_iter()
            .map(|(record, distance)| ScoredDocument {
                id: record.id,
                text: record.text,
                metadata: record.metadata,
                similarity: similarity_from_distance(collection.metric, distance),
                threshold: collection.similarity_threshold,
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(hits)
    }

    pub async fn count(&self, collection_name: &str) -> Result<usize> {
        self.collection(collection_name)?;
        self.index.count(collection_name).await
    }

    /// Record the exact parameters a collection was built with (model, metric,
    /// index effort, threshold) so a later reindex can recover them.
    fn snapshot_collection_config(&self, collection: &CollectionConfig) -> Result<()> {
        let dir = self.data_dir.join("collections");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", collection.name));
        let json = serde_json::to_string_pretty(collection)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssistConfig;
    use crate::embeddings::{EmbeddingModel, HashModelLoader, ModelLoader};
    use crate::types::DocMetadata;

    struct UnavailableLoader;

    impl ModelLoader for UnavailableLoader {
        fn load(&self, name: &str) -> Result<Arc<dyn EmbeddingModel>> {
            anyhow::bail!("model '{name}' unavailable")
        }
    }

    fn adapter_with_loader(
        dir: &std::path::Path,
        loader: Arc<dyn ModelLoader>,
    ) -> DocumentStoreAdapter {
        let config = AssistConfig::default();
        let provider = Arc::new(EmbeddingProvider::new(loader, 100, 2));
        DocumentStoreAdapter::new(
            Arc::new(MemoryIndex::new()),
            provider,
            &config.collections,
            dir.to_path_buf(),
        )
    }

    fn test_adapter(dir: &std::path::Path) -> DocumentStoreAdapter {
        adapter_with_loader(dir, Arc::new(HashModelLoader { dimension: 384 }))
    }

    fn doc(id: &str, text: &str) -> IndexedDocument {
        IndexedDocument {
            id: id.into(),
            text: text.into(),
            metadata: DocMetadata::default(),
        }
    }

    #[test]
    fn similarity_conversion_is_bounded() {
        assert_eq!(similarity_from_distance(DistanceMetric::Cosine, 0.0), 1.0);
        assert_eq!(similarity_from_distance(DistanceMetric::Cosine, 2.0), 0.0);
        assert_eq!(similarity_from_distance(DistanceMetric::Cosine, 5.0), 0.0);
        assert!(similarity_from_distance(DistanceMetric::L2, 1.0) > 0.0);
    }

    #[tokio::test]
    async fn unknown_collection_search_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = test_adapter(dir.path());
        let hits = adapter.search("no_such_collection", "질문", 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn dimension_mismatch_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        // The model emits 256-dim vectors against 384-dim collections.
        let adapter =
            adapter_with_loader(dir.path(), Arc::new(HashModelLoader { dimension: 256 }));
        let hits = adapter.search("qna_patterns", "연차 규정", 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn model_load_failure_propagates_from_search() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter_with_loader(dir.path(), Arc::new(UnavailableLoader));
        let err = adapter.search("qna_patterns", "연차 규정", 3).await.unwrap_err();
        assert!(matches!(err, AssistError::ModelLoad { .. }));
    }

    #[tokio::test]
    async fn upsert_then_search_ranks_exact_text_first() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = test_adapter(dir.path());
        adapter
            .upsert(
                "qna_patterns",
                vec![
                    doc("p1", "연차 신청 방법 알려줘"),
                    doc("p2", "회사 주소가 어디인가요"),
                ],
            )
            .await
            .unwrap();

        let hits = adapter
            .search("qna_patterns", "연차 신청 방법 알려줘", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "p1");
        assert!(hits[0].similarity > hits[1].similarity);
        assert_eq!(hits[0].threshold, 0.7);
    }

    #[tokio::test]
    async fn upsert_snapshots_collection_config() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = test_adapter(dir.path());
        adapter.upsert("qna_patterns", vec![doc("p1", "질문")]).await.unwrap();
        let snapshot = dir.path().join("collections").join("qna_patterns.json");
        assert!(snapshot.exists());
        let parsed: CollectionConfig =
            serde_json::from_str(&std::fs::read_to_string(snapshot).unwrap()).unwrap();
        assert_eq!(parsed.similarity_threshold, 0.7);
    }
}
