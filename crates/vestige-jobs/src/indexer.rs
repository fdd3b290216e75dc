//! Artifact reindexing: decrypt, chunk, embed, replace.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use vestige_core::{
    ArtifactRepository, ChunkRepository, EmbeddingBackend, Error, NewMemoryChunk, Result,
};
use vestige_crypto::{CryptoError, EnvelopeKey};
use vestige_db::{blob_store::BlobStore, ParagraphChunker};

/// Result of a reindex run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The chunk set was replaced with `n` new chunks.
    Indexed(usize),
    /// Media type is not a recognized text family; prior chunks untouched.
    Skipped,
    /// Decrypted text was empty; prior chunks cleared.
    Cleared,
}

/// Whether a declared media type belongs to the plain-text family vestige
/// can index. Parameters after `;` are ignored.
pub fn is_text_family(mime: &str) -> bool {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("text/")
        || matches!(
            essence.as_str(),
            "application/json"
                | "application/markdown"
                | "application/xml"
                | "application/x-yaml"
                | "application/yaml"
        )
}

fn map_crypto_error(e: CryptoError) -> Error {
    match e {
        CryptoError::Config(msg) => Error::Config(msg),
        CryptoError::Encryption(msg) => Error::Internal(msg),
        CryptoError::Truncated(len) => {
            Error::Integrity(format!("envelope truncated at {} bytes", len))
        }
        CryptoError::Authentication => {
            Error::Integrity("artifact blob failed authentication".to_string())
        }
    }
}

/// Reindexes a single artifact into its replacement chunk set.
pub struct IndexArtifactHandler {
    artifacts: Arc<dyn ArtifactRepository>,
    chunks: Arc<dyn ChunkRepository>,
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<dyn EmbeddingBackend>,
    key: EnvelopeKey,
    chunker: ParagraphChunker,
}

impl IndexArtifactHandler {
    pub fn new(
        artifacts: Arc<dyn ArtifactRepository>,
        chunks: Arc<dyn ChunkRepository>,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        key: EnvelopeKey,
    ) -> Self {
        Self {
            artifacts,
            chunks,
            blobs,
            embedder,
            key,
            chunker: ParagraphChunker::default(),
        }
    }

    /// Rebuild the chunk index for one artifact.
    ///
    /// Non-text media types are skipped without touching any prior chunks.
    /// Empty decrypted text clears the artifact's chunk set. Otherwise the
    /// text is chunked, embedded in one batch, and the chunk set replaced
    /// transactionally.
    pub async fn reindex(&self, artifact_id: Uuid) -> Result<IndexOutcome> {
        let start = Instant::now();
        let artifact = self.artifacts.fetch(artifact_id).await?;

        if !is_text_family(&artifact.original_mime) {
            debug!(
                subsystem = "indexer",
                artifact_id = %artifact_id,
                mime = %artifact.original_mime,
                "Media type not indexable, skipping"
            );
            return Ok(IndexOutcome::Skipped);
        }

        let envelope = self.blobs.read(&artifact.storage_path).await?;
        let plaintext = vestige_crypto::open(&self.key, &envelope).map_err(map_crypto_error)?;
        let text = String::from_utf8_lossy(&plaintext);

        if text.trim().is_empty() {
            self.chunks
                .replace_for_artifact(&artifact, Vec::new())
                .await?;
            info!(
                subsystem = "indexer",
                artifact_id = %artifact_id,
                "Artifact text empty, cleared chunk index"
            );
            return Ok(IndexOutcome::Cleared);
        }

        let pieces = self.chunker.chunk(&text);
        let embeddings = self.embedder.embed_texts(&pieces).await?;

        if embeddings.len() != pieces.len() {
            return Err(Error::Embedding(format!(
                "embedding count mismatch: {} texts, {} vectors",
                pieces.len(),
                embeddings.len()
            )));
        }

        let new_chunks: Vec<NewMemoryChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| NewMemoryChunk::new(content, embedding))
            .collect();

        let count = self
            .chunks
            .replace_for_artifact(&artifact, new_chunks)
            .await?;

        info!(
            subsystem = "indexer",
            artifact_id = %artifact_id,
            chunk_count = count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Artifact reindexed"
        );
        Ok(IndexOutcome::Indexed(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use vestige_core::{Artifact, CreateArtifactRequest, RetrievalMatch, Vector};
    use vestige_inference::MockEmbeddingBackend;

    struct FakeArtifactRepository {
        artifacts: Mutex<HashMap<Uuid, Artifact>>,
    }

    #[async_trait]
    impl ArtifactRepository for FakeArtifactRepository {
        async fn insert(&self, _req: CreateArtifactRequest) -> Result<Artifact> {
            unimplemented!("not used by the indexer")
        }

        async fn finalize_path(&self, _id: Uuid, _storage_path: &str) -> Result<()> {
            unimplemented!("not used by the indexer")
        }

        async fn fetch(&self, id: Uuid) -> Result<Artifact> {
            self.artifacts
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or(Error::ArtifactNotFound(id))
        }

        async fn fetch_owned(&self, id: Uuid, _user_id: Uuid) -> Result<Artifact> {
            self.fetch(id).await
        }
    }

    #[derive(Default)]
    struct FakeChunkRepository {
        replacements: Mutex<Vec<(Uuid, Vec<NewMemoryChunk>)>>,
    }

    #[async_trait]
    impl ChunkRepository for FakeChunkRepository {
        async fn replace_for_artifact(
            &self,
            artifact: &Artifact,
            chunks: Vec<NewMemoryChunk>,
        ) -> Result<usize> {
            let count = chunks.len();
            self.replacements
                .lock()
                .unwrap()
                .push((artifact.id, chunks));
            Ok(count)
        }

        async fn rank_by_similarity(
            &self,
            _relationship_id: Uuid,
            _query: &Vector,
            _k: i64,
        ) -> Result<Vec<RetrievalMatch>> {
            Ok(vec![])
        }

    }

    #[derive(Default)]
    struct MemoryBlobStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
            self.blobs
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn read(&self, path: &str) -> Result<Vec<u8>> {
            self.blobs
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("blob {}", path)))
        }

        async fn delete(&self, path: &str) -> Result<()> {
            self.blobs.lock().unwrap().remove(path);
            Ok(())
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            Ok(self.blobs.lock().unwrap().contains_key(path))
        }
    }

    struct Fixture {
        handler: IndexArtifactHandler,
        artifacts: Arc<FakeArtifactRepository>,
        chunks: Arc<FakeChunkRepository>,
        blobs: Arc<MemoryBlobStore>,
        key: EnvelopeKey,
    }

    fn fixture_with_embedder(embedder: MockEmbeddingBackend) -> Fixture {
        let artifacts = Arc::new(FakeArtifactRepository {
            artifacts: Mutex::new(HashMap::new()),
        });
        let chunks = Arc::new(FakeChunkRepository::default());
        let blobs = Arc::new(MemoryBlobStore::default());
        let key = EnvelopeKey::new([7u8; 32]);

        let handler = IndexArtifactHandler::new(
            artifacts.clone(),
            chunks.clone(),
            blobs.clone(),
            Arc::new(embedder),
            key.clone(),
        );

        Fixture {
            handler,
            artifacts,
            chunks,
            blobs,
            key,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_embedder(MockEmbeddingBackend::new().with_dimension(8))
    }

    async fn seed_artifact(fx: &Fixture, mime: &str, plaintext: &[u8]) -> Uuid {
        let id = Uuid::new_v4();
        let path = format!("blobs/{}.enc", id);

        let envelope = vestige_crypto::seal(&fx.key, plaintext).unwrap();
        fx.blobs.write(&path, &envelope).await.unwrap();

        let artifact = Artifact {
            id,
            user_id: Uuid::new_v4(),
            relationship_id: Uuid::new_v4(),
            storage_path: path,
            original_mime: mime.to_string(),
            original_name: "letter.txt".to_string(),
            size_bytes: envelope.len() as i64,
            created_at: Utc::now(),
        };
        fx.artifacts
            .artifacts
            .lock()
            .unwrap()
            .insert(id, artifact);
        id
    }

    #[tokio::test]
    async fn test_reindex_text_artifact() {
        let fx = fixture();
        let id = seed_artifact(&fx, "text/plain", b"First memory.\n\nSecond memory.").await;

        let outcome = fx.handler.reindex(id).await.unwrap();
        assert_eq!(outcome, IndexOutcome::Indexed(1));

        let replacements = fx.chunks.replacements.lock().unwrap();
        assert_eq!(replacements.len(), 1);
        assert_eq!(replacements[0].0, id);
        assert_eq!(
            replacements[0].1[0].content,
            "First memory.\n\nSecond memory."
        );
        assert!(replacements[0].1[0].n_tokens > 0);
    }

    #[tokio::test]
    async fn test_non_text_media_skipped_without_touching_chunks() {
        let fx = fixture();
        let id = seed_artifact(&fx, "image/png", b"not really a png").await;

        let outcome = fx.handler.reindex(id).await.unwrap();
        assert_eq!(outcome, IndexOutcome::Skipped);
        assert!(fx.chunks.replacements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_clears_prior_chunks() {
        let fx = fixture();
        let id = seed_artifact(&fx, "text/plain", b"   \n\n  ").await;

        let outcome = fx.handler.reindex(id).await.unwrap();
        assert_eq!(outcome, IndexOutcome::Cleared);

        let replacements = fx.chunks.replacements.lock().unwrap();
        assert_eq!(replacements.len(), 1);
        assert!(replacements[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_artifact() {
        let fx = fixture();
        let result = fx.handler.reindex(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::ArtifactNotFound(_))));
    }

    #[tokio::test]
    async fn test_tampered_blob_fails_integrity() {
        let fx = fixture();
        let id = seed_artifact(&fx, "text/plain", b"the truth").await;

        // Corrupt the stored envelope.
        let artifact = fx.artifacts.fetch(id).await.unwrap();
        let mut envelope = fx.blobs.read(&artifact.storage_path).await.unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0x01;
        fx.blobs.write(&artifact.storage_path, &envelope).await.unwrap();

        let result = fx.handler.reindex(id).await;
        assert!(matches!(result, Err(Error::Integrity(_))));
        assert!(fx.chunks.replacements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_chunks_untouched() {
        let fx = fixture_with_embedder(MockEmbeddingBackend::new().failing());
        let id = seed_artifact(&fx, "text/markdown", b"# Title\n\nBody text.").await;

        let result = fx.handler.reindex(id).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
        assert!(fx.chunks.replacements.lock().unwrap().is_empty());
    }

    #[test]
    fn test_is_text_family() {
        assert!(is_text_family("text/plain"));
        assert!(is_text_family("text/markdown"));
        assert!(is_text_family("TEXT/PLAIN; charset=utf-8"));
        assert!(is_text_family("application/json"));
        assert!(is_text_family("application/markdown"));
        assert!(is_text_family("application/xml"));
        assert!(is_text_family("application/x-yaml"));
        assert!(is_text_family("application/yaml"));

        assert!(!is_text_family("image/png"));
        assert!(!is_text_family("application/pdf"));
        assert!(!is_text_family("audio/mpeg"));
        assert!(!is_text_family(""));
    }
}
