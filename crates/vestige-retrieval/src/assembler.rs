//! Query embedding, similarity ranking, and context rendering.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use vestige_core::{defaults, ChunkRepository, EmbeddingBackend, Result, RetrievalMatch};

/// Assembles retrieval-augmented context for a conversation turn.
pub struct RetrievalAssembler {
    embedder: Arc<dyn EmbeddingBackend>,
    chunks: Arc<dyn ChunkRepository>,
    k: i64,
    query_max_chars: usize,
}

impl RetrievalAssembler {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, chunks: Arc<dyn ChunkRepository>) -> Self {
        Self {
            embedder,
            chunks,
            k: defaults::RETRIEVAL_K,
            query_max_chars: defaults::QUERY_MAX_CHARS,
        }
    }

    /// Override the match count, mainly for tests.
    pub fn with_k(mut self, k: i64) -> Self {
        self.k = k;
        self
    }

    /// Retrieve the most similar chunks within a relationship.
    ///
    /// An empty query yields an empty result without an embedding call.
    /// Overlong queries are truncated to their trailing portion before
    /// embedding, since the most recent content carries the query intent.
    /// A ranking failure degrades to an empty result; an embedding failure
    /// propagates.
    pub async fn retrieve(
        &self,
        relationship_id: Uuid,
        query: &str,
    ) -> Result<Vec<RetrievalMatch>> {
        if query.is_empty() {
            return Ok(vec![]);
        }

        let query = tail_chars(query, self.query_max_chars);
        let vectors = self.embedder.embed_texts(&[query.to_string()]).await?;
        let Some(query_vector) = vectors.into_iter().next() else {
            warn!(
                subsystem = "retrieval",
                relationship_id = %relationship_id,
                "Embedding backend returned no vector for query"
            );
            return Ok(vec![]);
        };

        match self
            .chunks
            .rank_by_similarity(relationship_id, &query_vector, self.k)
            .await
        {
            Ok(matches) => {
                debug!(
                    subsystem = "retrieval",
                    relationship_id = %relationship_id,
                    match_count = matches.len(),
                    "Retrieved memory matches"
                );
                Ok(matches)
            }
            Err(e) => {
                // Grounding is best-effort; the conversation continues
                // without memories rather than failing.
                warn!(
                    subsystem = "retrieval",
                    relationship_id = %relationship_id,
                    error_msg = %e,
                    "Similarity ranking failed, degrading to empty context"
                );
                Ok(vec![])
            }
        }
    }
}

/// Take the trailing `max_chars` characters of a string, on a char boundary.
fn tail_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Render matches as a private context block with stable rank markers.
///
/// Empty input renders to an empty string so the block can be dropped from
/// the prompt without a conditional at the call site.
pub fn render_context(matches: &[RetrievalMatch]) -> String {
    if matches.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = matches
        .iter()
        .enumerate()
        .map(|(i, m)| format!("- [m{}] {}", i + 1, m.content))
        .collect();

    format!(
        "\n\n# Memories (private context)\n{}\n\nUse these to stay accurate, but do not say you are reading documents.",
        lines.join("\n")
    )
}
