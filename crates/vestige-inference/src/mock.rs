//! Mock backends for deterministic testing.
//!
//! Both mocks implement the core backend traits, record their calls, and
//! are fully deterministic: embeddings are derived from text content and
//! completion fragments are scripted up front. Always compiled so
//! downstream crates can use them in their own tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use vestige_core::{
    ChatMessage, CompletionBackend, EmbeddingBackend, Error, Result, TokenStream, Vector,
};

/// Deterministic embedding backend.
///
/// Each vector is derived from a hash of the input text, so equal texts
/// always embed identically and different texts rarely collide.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    fail: bool,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            dimension: 1536,
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Make every embed call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Batches passed to `embed_texts`, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of embed calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn embed_one(&self, text: &str) -> Vector {
        // FNV-1a over the text seeds a repeatable pseudo-vector.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in text.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }

        let values: Vec<f32> = (0..self.dimension)
            .map(|i| {
                let x = hash.wrapping_add(i as u64).wrapping_mul(0x9e3779b97f4a7c15);
                ((x >> 40) as f32 / (1 << 24) as f32) - 0.5
            })
            .collect();
        Vector::from(values)
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.calls.lock().unwrap().push(texts.to_vec());

        if self.fail {
            return Err(Error::Embedding("mock embedding failure".to_string()));
        }

        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

/// One recorded completion call.
#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// Scripted streaming completion backend.
///
/// Yields its configured fragments in order; with `fail_after(n)` the
/// stream emits the first `n` fragments and then one error.
#[derive(Clone)]
pub struct MockCompletionBackend {
    fragments: Vec<String>,
    fail_after: Option<usize>,
    fail_on_open: bool,
    calls: Arc<Mutex<Vec<CompletionCall>>>,
}

impl MockCompletionBackend {
    pub fn new(fragments: Vec<impl Into<String>>) -> Self {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            fail_after: None,
            fail_on_open: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Emit the first `n` fragments, then a stream error.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fail when opening the stream, before any fragment.
    pub fn failing(mut self) -> Self {
        self.fail_on_open = true;
        self
    }

    /// Calls made to `stream_chat`, in order.
    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    async fn stream_chat(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.calls.lock().unwrap().push(CompletionCall {
            system: system.to_string(),
            messages: messages.to_vec(),
        });

        if self.fail_on_open {
            return Err(Error::Inference("mock completion failure".to_string()));
        }

        let mut items: Vec<Result<String>> = match self.fail_after {
            Some(n) => self.fragments.iter().take(n).cloned().map(Ok).collect(),
            None => self.fragments.iter().cloned().map(Ok).collect(),
        };
        if self.fail_after.is_some() {
            items.push(Err(Error::Inference("mock stream failure".to_string())));
        }

        Ok(Box::pin(stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let backend = MockEmbeddingBackend::new().with_dimension(8);
        let a = backend.embed_texts(&["same".to_string()]).await.unwrap();
        let b = backend.embed_texts(&["same".to_string()]).await.unwrap();
        assert_eq!(a[0].as_slice(), b[0].as_slice());
        assert_eq!(a[0].as_slice().len(), 8);
    }

    #[tokio::test]
    async fn test_different_texts_differ() {
        let backend = MockEmbeddingBackend::new().with_dimension(8);
        let vectors = backend
            .embed_texts(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_ne!(vectors[0].as_slice(), vectors[1].as_slice());
    }

    #[tokio::test]
    async fn test_embed_call_log() {
        let backend = MockEmbeddingBackend::new();
        backend.embed_texts(&["a".to_string()]).await.unwrap();
        backend
            .embed_texts(&["b".to_string(), "c".to_string()])
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_embed_backend() {
        let backend = MockEmbeddingBackend::new().failing();
        let result = backend.embed_texts(&["x".to_string()]).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_fragments() {
        let backend = MockCompletionBackend::new(vec!["Hel", "lo"]);
        let mut stream = backend
            .stream_chat("sys", &[ChatMessage::user("hi")])
            .await
            .unwrap();

        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment.unwrap());
        }
        assert_eq!(reply, "Hello");

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, "sys");
    }

    #[tokio::test]
    async fn test_fail_after_two_fragments() {
        let backend = MockCompletionBackend::new(vec!["a", "b", "c"]).fail_after(2);
        let mut stream = backend.stream_chat("", &[]).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next().await.unwrap().unwrap(), "b");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_on_open() {
        let backend = MockCompletionBackend::new(vec!["never"]).failing();
        let result = backend.stream_chat("", &[]).await;
        assert!(result.is_err());
    }
}
