pub mod hash;

use anyhow::Result;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AssistError;

pub use hash::HashEmbedder;

/// Unified embedding model trait
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query (with appropriate prefix for the model)
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a document/passage (with appropriate prefix for the model)
    fn embed_document(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed documents for ingestion
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_document(t)).collect()
    }

    /// Embedding vector dimension
    fn dimension(&self) -> usize;
}

/// Resolves a model name to a loaded model. The plug point for real ONNX or
/// API-backed embedders; the crate ships a deterministic offline default.
pub trait ModelLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<dyn EmbeddingModel>>;
}

/// Loader that serves the in-crate feature-hashing embedder for any name.
pub struct HashModelLoader {
    pub dimension: usize,
}

impl ModelLoader for HashModelLoader {
    fn load(&self, _name: &str) -> Result<Arc<dyn EmbeddingModel>> {
        Ok(Arc::new(HashEmbedder::new(self.dimension)))
    }
}

/// Lazy, process-local model cache with guaranteed-clean output vectors.
///
/// Concurrency: a per-model-name lock with a recheck after acquisition means N
/// concurrent first callers block behind exactly one load. Loads are retried
/// with exponential backoff before surfacing [`AssistError::ModelLoad`].
pub struct EmbeddingProvider {
    loader: Arc<dyn ModelLoader>,
    models: DashMap<String, Arc<dyn EmbeddingModel>>,
    load_locks: DashMap<String, Arc<Mutex<()>>>,
    cache: Mutex<LruCache<(String, String), Vec<f32>>>,
    load_attempts: u32,
}

impl EmbeddingProvider {
    pub fn new(loader: Arc<dyn ModelLoader>, cache_size: usize, load_attempts: u32) -> Self {
        let cache_size = NonZeroUsize::new(cache_size.max(1)).expect("max(1) is non-zero");
        Self {
            loader,
            models: DashMap::new(),
            load_locks: DashMap::new(),
            cache: Mutex::new(LruCache::new(cache_size)),
            load_attempts: load_attempts.max(1),
        }
    }

    /// Fetch (or lazily load) a model by name.
    pub fn model(&self, name: &str) -> Result<Arc<dyn EmbeddingModel>, AssistError> {
        if let Some(model) = self.models.get(name) {
            return Ok(model.clone());
        }

        let lock = self
            .load_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        // Another caller may have finished the load while we waited.
        if let Some(model) = self.models.get(name) {
            return Ok(model.clone());
        }

        let mut last_error = String::new();
        for attempt in 0..self.load_attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * (1 << attempt.min(6)));
                tracing::warn!(
                    model = %name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "embedding model load retry"
                );
                std::thread::sleep(backoff);
            }
            match self.loader.load(name) {
                Ok(model) => {
                    tracing::info!(model = %name, dimension = model.dimension(), "embedding model loaded");
                    self.models.insert(name.to_string(), model.clone());
                    return Ok(model);
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        Err(AssistError::ModelLoad {
            model: name.to_string(),
            reason: last_error,
        })
    }

    /// Embed one text, guaranteeing the declared dimension and finite values.
    /// Empty or whitespace-only input yields a zero vector rather than an
    /// error, so partially-empty batches degrade gracefully.
    pub fn embed_query(&self, model_name: &str, text: &str) -> Result<Vec<f32>, AssistError> {
        self.embed_with(model_name, text, true)
    }

    pub fn embed_document(&self, model_name: &str, text: &str) -> Result<Vec<f32>, AssistError> {
        self.embed_with(model_name, text, false)
    }

    pub fn embed_batch(
        &self,
        model_name: &str,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, AssistError> {
        texts
            .iter()
            .map(|t| self.embed_document(model_name, t))
            .collect()
    }

    fn embed_with(
        &self,
        model_name: &str,
        text: &str,
        is_query: bool,
    ) -> Result<Vec<f32>, AssistError> {
        let model = self.model(model_name)?;
        let dimension = model.dimension();

        if text.trim().is_empty() {
            return Ok(vec![0.0; dimension]);
        }

        let cache_key = (model_name.to_string(), text.to_string());
        if let Some(cached) = self.cache.lock().get(&cache_key) {
            return Ok(cached.clone());
        }

        let raw = if is_query {
            model.embed_query(text)
        } else {
            model.embed_document(text)
        }
        .map_err(|e| AssistError::ModelLoad {
            model: model_name.to_string(),
            reason: format!("embedding failed: {e}"),
        })?;

        let vector = conform_vector(raw, dimension);
        self.cache.lock().put(cache_key, vector.clone());
        Ok(vector)
    }
}

/// Force a raw model output into exactly `dimension` finite components.
///
/// Non-finite values are zeroed first. Oversized vectors are pooled by
/// repeated halve-and-average until they fit; undersized ones are
/// zero-padded. Deterministic so reindex runs are reproducible.
pub fn conform_vector(mut v: Vec<f32>, dimension: usize) -> Vec<f32> {
    for x in v.iter_mut() {
        if !x.is_finite() {
            *x = 0.0;
        }
    }

    while v.len() > dimension {
        let half = v.len().div_ceil(2);
        let mut pooled = Vec::with_capacity(half);
        for i in 0..half {
            let a = v[2 * i];
            let b = v.get(2 * i + 1).copied().unwrap_or(0.0);
            pooled.push((a + b) / 2.0);
        }
        v = pooled;
    }

    v.resize(dimension, 0.0);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        dimension: usize,
        loads: Arc<AtomicUsize>,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self, _name: &str) -> Result<Arc<dyn EmbeddingModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(HashEmbedder::new(self.dimension)))
        }
    }

    struct FailingLoader;

    impl ModelLoader for FailingLoader {
        fn load(&self, name: &str) -> Result<Arc<dyn EmbeddingModel>> {
            anyhow::bail!("model '{name}' unavailable")
        }
    }

    fn provider_with_counter(loads: Arc<AtomicUsize>) -> EmbeddingProvider {
        EmbeddingProvider::new(
            Arc::new(CountingLoader {
                dimension: 32,
                loads,
            }),
            100,
            3,
        )
    }

    #[test]
    fn output_dimension_is_invariant_even_for_empty_input() {
        let provider = provider_with_counter(Arc::new(AtomicUsize::new(0)));
        for text in ["재택근무 규정 알려줘", "", "   "] {
            let v = provider.embed_query("m", text).unwrap();
            assert_eq!(v.len(), 32);
            assert!(v.iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn repeated_requests_load_the_model_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let provider = provider_with_counter(loads.clone());
        provider.embed_query("m", "연차 신청 방법").unwrap();
        provider.embed_query("m", "연차 신청 방법").unwrap();
        provider.embed_query("m", "다른 질문").unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_failure_is_bounded_and_typed() {
        let provider = EmbeddingProvider::new(Arc::new(FailingLoader), 10, 2);
        let err = provider.embed_query("broken", "질문").unwrap_err();
        assert!(matches!(err, AssistError::ModelLoad { .. }));
    }

    #[test]
    fn conform_pools_oversized_vectors() {
        let v = conform_vector(vec![1.0, 3.0, 5.0, 7.0], 2);
        assert_eq!(v, vec![2.0, 6.0]);
    }

    #[test]
    fn conform_zeroes_non_finite_and_pads() {
        let v = conform_vector(vec![f32::NAN, f32::INFINITY], 4);
        assert_eq!(v, vec![0.0, 0.0, 0.0, 0.0]);
    }
}
