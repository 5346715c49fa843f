//! Deterministic local embedding provider
//!
//! Hashed bag-of-words embedder: each lowercased token is hashed into one of
//! 384 buckets and the resulting vector is L2-normalized. Identical text
//! always embeds identically and near-identical text embeds nearby, with no
//! model download or network access. Production deployments swap in a real
//! model behind the same port.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use jive_domain::error::Result;
use jive_domain::ports::EmbeddingProvider;
use jive_domain::value_objects::Embedding;

/// Embedding dimensionality used by every table vector column.
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Deterministic feature-hash embedding provider.
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Provider with the standard 384-dim output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hashed = hasher.finish();
            let bucket = (hashed % self.dimensions as u64) as usize;
            // Signed hashing: the top hash bit picks the contribution sign
            let sign = if hashed & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Embedding(vector)
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let provider = HashEmbeddingProvider::new();
        let a = provider.embed("payment integration service").await.unwrap();
        let b = provider.embed("payment integration service").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimensions(), EMBEDDING_DIMENSIONS);
    }

    #[tokio::test]
    async fn similar_text_is_closer_than_unrelated_text() {
        let provider = HashEmbeddingProvider::new();
        let base = provider.embed("database connection timeout").await.unwrap();
        let near = provider
            .embed("database connection timeout on startup")
            .await
            .unwrap();
        let far = provider.embed("frontend css layout glitch").await.unwrap();
        assert!(base.l2_distance(&near) < base.l2_distance(&far));
    }

    #[tokio::test]
    async fn vectors_are_normalized() {
        let provider = HashEmbeddingProvider::new();
        let e = provider.embed("one two three").await.unwrap();
        let norm: f32 = e.0.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let provider = HashEmbeddingProvider::new();
        let e = provider.embed("").await.unwrap();
        assert!(e.0.iter().all(|v| *v == 0.0));
    }
}
