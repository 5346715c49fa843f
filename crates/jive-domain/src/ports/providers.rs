//! External provider ports

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::Embedding;

/// Text embedding generation port.
///
/// The engine consumes the embedding model purely as `embed(text) → vector`;
/// whether that is a local model, a remote API, or a deterministic test
/// embedder is a provider concern.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an embedding error when the provider fails or returns an
    /// empty batch.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_owned()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::Error::embedding("No embedding returned"))
    }

    /// Embed a batch of texts, preserving order.
    ///
    /// # Errors
    ///
    /// Returns an embedding error when the provider fails.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Output dimensionality of this provider.
    fn dimensions(&self) -> usize;

    /// A string identifier for the provider (e.g. "hash", "remote").
    fn provider_name(&self) -> &str;

    /// Health check for the provider (default implementation).
    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}
