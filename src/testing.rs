//! In-process provider doubles for unit tests

use crate::error::{Error, Result};
use crate::providers::{ChatMessage, CompletionProvider, EmbeddingProvider, ProviderHandle};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Embeds every text to the same vector
pub struct FixedEmbedder(pub Vec<f32>);

impl FixedEmbedder {
    pub fn handle(vector: Vec<f32>) -> ProviderHandle<dyn EmbeddingProvider> {
        ProviderHandle::configured(Arc::new(Self(vector)) as Arc<dyn EmbeddingProvider>)
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

/// Fixed-vector embedder that counts its calls
pub struct CountingEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            vector,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn handle(this: &Arc<Self>) -> ProviderHandle<dyn EmbeddingProvider> {
        ProviderHandle::configured(this.clone() as Arc<dyn EmbeddingProvider>)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn name(&self) -> &str {
        "counting"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }
}

/// Embedding provider that always errors
pub struct FailingEmbedder;

impl FailingEmbedder {
    pub fn handle() -> ProviderHandle<dyn EmbeddingProvider> {
        ProviderHandle::configured(Arc::new(Self) as Arc<dyn EmbeddingProvider>)
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Upstream {
            status: 500,
            message: "embedding backend down".to_string(),
        })
    }
}

/// Completion provider returning a fixed reply and recording every request
pub struct ScriptedCompletion {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Message sequences received so far
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(message) => Err(Error::Upstream {
                status: 429,
                message: message.clone(),
            }),
        }
    }
}
