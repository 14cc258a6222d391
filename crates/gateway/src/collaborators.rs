//! Default wiring for the remote-facing collaborator boundaries that
//! `sa-registry` and `sa-index` deliberately leave abstract.
//!
//! Neither the vector-store/file-hosting API nor the embedding API is part
//! of this workspace's dependency stack, so the gateway binds each trait to
//! a local, offline implementation: deletes are logged and always succeed,
//! and embeddings are a deterministic hash projection good enough to drive
//! lexical+vector fusion in `sa_index::search` without calling out to
//! anything. A deployment that wires up real collaborators replaces these
//! two structs and nothing else.

use sha2::{Digest, Sha256};

use sa_index::{EmbeddingProvider, RemoteError};
use sa_registry::RemoteFileDeleter;

/// Hashes a scope id to the hex digest used for transcript/session
/// filenames under `HALO_HOME`.
pub fn hash_scope_id(scope_id: &str) -> String {
    let digest = Sha256::digest(scope_id.as_bytes());
    hex::encode(digest)
}

/// Logs remote-delete calls instead of making them. Registry entries that
/// reference a vector-store or OpenAI file id are left pointing at ids that
/// no longer resolve anywhere real; this is acceptable for a gateway that
/// never created those ids through a live upload collaborator either.
pub struct LoggingRemoteFileDeleter;

#[async_trait::async_trait]
impl RemoteFileDeleter for LoggingRemoteFileDeleter {
    async fn delete_vector_store_file(
        &self,
        vector_store_id: &str,
        vector_store_file_id: &str,
    ) -> Result<(), String> {
        tracing::info!(
            vector_store_id,
            vector_store_file_id,
            "logging_remote_file_deleter: vector store file delete (no-op)"
        );
        Ok(())
    }

    async fn delete_openai_file(&self, openai_file_id: &str) -> Result<(), String> {
        tracing::info!(
            openai_file_id,
            "logging_remote_file_deleter: openai file delete (no-op)"
        );
        Ok(())
    }
}

const EMBEDDING_DIMS: usize = 64;

/// Deterministic local stand-in for a remote embedding API: projects each
/// text onto a fixed-width vector by hashing overlapping shingles into
/// buckets, then L2-normalizing. Two texts with overlapping vocabulary land
/// closer together under cosine similarity; it is not a semantic model, but
/// it is stable, free, and exercises the same code paths a real embedding
/// collaborator would.
pub struct LocalEmbeddingProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
        Ok(texts.iter().map(|t| embed_one(t)).collect())
    }
}

fn embed_one(text: &str) -> Vec<f32> {
    let mut buckets = vec![0f32; EMBEDDING_DIMS];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
    {
        let digest = Sha256::digest(token.as_bytes());
        let idx = (digest[0] as usize) % EMBEDDING_DIMS;
        let sign = if digest[1] % 2 == 0 { 1.0 } else { -1.0 };
        buckets[idx] += sign;
    }
    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for b in buckets.iter_mut() {
            *b /= norm;
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let provider = LocalEmbeddingProvider;
        let a = provider.embed(&["hello world".to_string()]).await.unwrap();
        let b = provider.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scope_hash_is_stable_hex() {
        let h1 = hash_scope_id("family:kid:dm");
        let h2 = hash_scope_id("family:kid:dm");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
