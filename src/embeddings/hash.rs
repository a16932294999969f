//! Deterministic feature-hashing sentence embedder.
//!
//! Offline stand-in for an ONNX sentence-transformer behind the same
//! [`EmbeddingModel`](super::EmbeddingModel) seam: word tokens and character
//! trigrams are hashed into signed buckets and L2-normalized, so texts that
//! share vocabulary land near each other under cosine similarity. Same input
//! always produces the same vector, which is what the reindex and test
//! contracts require.

use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::EmbeddingModel;

pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered.split_whitespace() {
            self.bump(&mut acc, token, 1.0);

            // Character trigrams give partial-overlap signal for agglutinative
            // suffixes (조정현님 vs 조정현).
            let chars: Vec<char> = token.chars().collect();
            if chars.len() > 3 {
                for window in chars.windows(3) {
                    let trigram: String = window.iter().collect();
                    self.bump(&mut acc, &trigram, 0.5);
                }
            }
        }

        let norm: f32 = acc.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in acc.iter_mut() {
                *x /= norm;
            }
        }
        acc
    }

    fn bump(&self, acc: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
        acc[bucket] += sign * weight;
    }
}

impl EmbeddingModel for HashEmbedder {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn embedding_is_deterministic() {
        let model = HashEmbedder::new(64);
        let a = model.embed_query("연차 신청 방법 알려줘").unwrap();
        let b = model.embed_query("연차 신청 방법 알려줘").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identical_text_is_more_similar_than_unrelated_text() {
        let model = HashEmbedder::new(128);
        let q = model.embed_query("2024년 매출 현황").unwrap();
        let same = model.embed_document("2024년 매출 현황").unwrap();
        let other = model.embed_document("사내 휴가 규정 문의").unwrap();
        assert!(cosine(&q, &same) > cosine(&q, &other));
    }

    #[test]
    fn vectors_are_unit_norm_for_non_empty_text() {
        let model = HashEmbedder::new(64);
        let v = model.embed_document("회사 소개").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
