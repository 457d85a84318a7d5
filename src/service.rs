//! Caller-facing service
//!
//! [`DiaryService`] owns one instance of every collaborator and exposes the
//! document, insight and memory operations the CLI and HTTP API use.

use crate::config::DiaryConfig;
use crate::document::Document;
use crate::error::Result;
use crate::insight::{Insight, InsightOrchestrator, InsightRequest};
use crate::memory::{Memory, MemoryContext, MemoryEngine, MemorySearchResult};
use crate::providers::{
    completion_from_config, embedding_from_config, CompletionProvider, EmbeddingProvider,
    ProviderHandle,
};
use crate::sanitize::{sanitize_text, sanitize_title};
use crate::storage::{
    remote_from_config, LocalCache, PersistenceCoordinator, RemoteStore, SyncReport,
};
use std::sync::Arc;

/// Journal service wiring storage, memory and insight generation together
pub struct DiaryService {
    config: DiaryConfig,
    documents: PersistenceCoordinator<Document>,
    insights: PersistenceCoordinator<Insight>,
    memories: PersistenceCoordinator<Memory>,
    memory: Arc<MemoryEngine>,
    orchestrator: InsightOrchestrator,
}

impl DiaryService {
    /// Build every collaborator from `config`
    pub fn from_config(config: DiaryConfig) -> Result<Self> {
        DiaryServiceBuilder::new().config(config).build()
    }

    pub fn builder() -> DiaryServiceBuilder {
        DiaryServiceBuilder::new()
    }

    pub fn config(&self) -> &DiaryConfig {
        &self.config
    }

    /// Whether a remote store is configured
    pub fn has_remote(&self) -> bool {
        self.documents.has_remote()
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Sanitize and save a new document
    pub async fn save_document(
        &self,
        title: &str,
        content: &str,
        tags: Vec<String>,
    ) -> Result<Document> {
        let document =
            Document::new(sanitize_title(title), sanitize_text(content)).with_tags(tags);
        self.documents.write(&document).await?;
        tracing::info!(document_id = %document.id, "Saved document");
        Ok(document)
    }

    /// Replace a document's title and body. `None` when the id is unknown.
    pub async fn update_document(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<Option<Document>> {
        let Some(mut document) = self.documents.get(id).await else {
            return Ok(None);
        };
        document.edit(sanitize_title(title), sanitize_text(content));
        self.documents.write(&document).await?;
        Ok(Some(document))
    }

    /// Every document, most recently updated first
    pub async fn load_documents(&self) -> Vec<Document> {
        self.documents.read_for_owner(None).await
    }

    pub async fn get_document(&self, id: &str) -> Option<Document> {
        self.documents.get(id).await
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.documents.delete(id).await
    }

    /// Push every locally cached document to the remote store
    pub async fn sync_documents(&self) -> Result<SyncReport> {
        let documents = self.documents.local_for_owner(None);
        self.documents.bulk_sync(&documents).await
    }

    // =========================================================================
    // Insights
    // =========================================================================

    /// Generate an insight for `document_content` and persist it.
    ///
    /// Only configuration and generation errors are returned; a failed local
    /// write is logged and the insight is still handed back.
    pub async fn generate_insight(
        &self,
        document_content: &str,
        request: InsightRequest,
        user_id: Option<&str>,
    ) -> Result<Insight> {
        let response = self
            .orchestrator
            .generate_insight(document_content, &request, user_id)
            .await?;
        let insight = response.into_insight(&request);

        if let Err(e) = self.insights.write(&insight).await {
            tracing::warn!("Failed to persist insight {}: {}", insight.id, e);
        }
        Ok(insight)
    }

    /// Generate a first insight for a stored document. `None` when the
    /// document does not exist.
    pub async fn analyze_document(
        &self,
        document_id: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Insight>> {
        let Some(document) = self.documents.get(document_id).await else {
            return Ok(None);
        };
        let insight = self
            .generate_insight(
                &document.content,
                InsightRequest::single(&document.id),
                user_id,
            )
            .await?;
        Ok(Some(insight))
    }

    /// Continue the conversation of an earlier insight.
    ///
    /// The new insight carries the full prior history. `None` when either
    /// the insight or its document is gone.
    pub async fn follow_up(
        &self,
        insight_id: &str,
        prompt: Option<String>,
        user_id: Option<&str>,
    ) -> Result<Option<Insight>> {
        let Some(previous) = self.insights.get(insight_id).await else {
            return Ok(None);
        };
        let Some(document) = self.documents.get(&previous.document_id).await else {
            return Ok(None);
        };
        let request =
            InsightRequest::follow_up(&document.id, prompt, previous.conversation_history);
        let insight = self
            .generate_insight(&document.content, request, user_id)
            .await?;
        Ok(Some(insight))
    }

    /// Insights of a document, newest first
    pub async fn load_insights_for_document(&self, document_id: &str) -> Vec<Insight> {
        self.insights.read_for_owner(Some(document_id)).await
    }

    pub async fn get_insight(&self, id: &str) -> Option<Insight> {
        self.insights.get(id).await
    }

    /// Delete an insight; succeeds locally even when the remote delete fails
    pub async fn delete_insight(&self, id: &str) -> Result<()> {
        self.insights.delete(id).await
    }

    /// Push a document's locally cached insights to the remote store
    pub async fn sync_insights(&self, document_id: &str) -> Result<SyncReport> {
        let insights = self.insights.local_for_owner(Some(document_id));
        self.insights.bulk_sync(&insights).await
    }

    // =========================================================================
    // Memory
    // =========================================================================

    pub async fn get_memory_context(
        &self,
        content: &str,
        user_id: &str,
        max_memories: usize,
    ) -> MemoryContext {
        self.memory
            .get_memory_context(content, user_id, max_memories)
            .await
    }

    pub async fn search_memories(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Vec<MemorySearchResult> {
        self.memory.search_memories(query, user_id, limit).await
    }

    /// Profile `content` and store it as a memory, returning the new id
    pub async fn remember(&self, content: &str, user_id: &str) -> String {
        self.memory.remember_entry(content, user_id).await
    }

    /// Memories of a user, newest first
    pub async fn load_memories(&self, user_id: &str) -> Vec<Memory> {
        self.memories.read_for_owner(Some(user_id)).await
    }

    /// Push a user's locally cached memories to the remote store
    pub async fn sync_memories(&self, user_id: &str) -> Result<SyncReport> {
        let memories = self.memories.local_for_owner(Some(user_id));
        self.memories.bulk_sync(&memories).await
    }
}

/// Builder for [`DiaryService`].
///
/// Collaborators not set explicitly are built from the configuration.
pub struct DiaryServiceBuilder {
    config: DiaryConfig,
    local: Option<Arc<LocalCache>>,
    completion: Option<ProviderHandle<dyn CompletionProvider>>,
    embedder: Option<ProviderHandle<dyn EmbeddingProvider>>,
    remote: Option<ProviderHandle<dyn RemoteStore>>,
}

impl DiaryServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: DiaryConfig::default(),
            local: None,
            completion: None,
            embedder: None,
            remote: None,
        }
    }

    pub fn config(mut self, config: DiaryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_cache(mut self, local: Arc<LocalCache>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn completion(mut self, completion: ProviderHandle<dyn CompletionProvider>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn embedder(mut self, embedder: ProviderHandle<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn remote(mut self, remote: ProviderHandle<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn build(self) -> Result<DiaryService> {
        let config = self.config;

        let local = match self.local {
            Some(local) => local,
            None => Arc::new(LocalCache::open(config.storage.base_dir.clone())?),
        };
        let completion = self
            .completion
            .unwrap_or_else(|| completion_from_config(&config.completion, &config.retry));
        let embedder = self
            .embedder
            .unwrap_or_else(|| embedding_from_config(&config.embedding, &config.retry));
        let remote = self
            .remote
            .unwrap_or_else(|| remote_from_config(&config.remote));

        for (name, configured) in [
            ("completion", completion.is_configured()),
            ("embedding", embedder.is_configured()),
            ("remote store", remote.is_configured()),
        ] {
            if configured {
                tracing::debug!("{} provider configured", name);
            } else {
                tracing::info!("{} provider unavailable, running degraded", name);
            }
        }

        let memory = Arc::new(
            MemoryEngine::new(embedder, remote.clone(), Arc::clone(&local))
                .with_match_threshold(config.memory.match_threshold),
        );
        let orchestrator = InsightOrchestrator::new(completion, Arc::clone(&memory))
            .with_context_size(config.memory.context_size);

        Ok(DiaryService {
            documents: PersistenceCoordinator::new(Arc::clone(&local), remote.clone()),
            insights: PersistenceCoordinator::new(Arc::clone(&local), remote.clone()),
            memories: PersistenceCoordinator::new(local, remote),
            memory,
            orchestrator,
            config,
        })
    }
}

impl Default for DiaryServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
