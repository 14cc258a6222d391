use crate::retry::RemoteError;

/// Boundary to the remote embedding API. Implemented outside this crate;
/// the indexing algorithms here only ever call through this trait, batching
/// cache misses into a single call per sync pass.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError>;
}
