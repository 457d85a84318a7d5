//! Memory engine
//!
//! Owns the memory lifecycle: store, similarity search with a lexical
//! fallback, and context assembly. No method here returns an error; every
//! failure degrades to a local-only write or an empty result and is logged.

use super::context::build_context;
use super::profile::{profile_entry, DIARY_ENTRY_CONTEXT};
use super::types::{Memory, MemoryContext, MemoryMetadata, MemorySearchResult, NewMemory};
use crate::providers::{EmbeddingProvider, ProviderHandle};
use crate::storage::coordinator::decode_rows;
use crate::storage::{Collection, LocalCache, RemoteStore};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Default similarity floor for vector search
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.7;

/// Stores and retrieves memories
pub struct MemoryEngine {
    embedder: ProviderHandle<dyn EmbeddingProvider>,
    remote: ProviderHandle<dyn RemoteStore>,
    local: Arc<LocalCache>,
    match_threshold: f32,
}

impl MemoryEngine {
    pub fn new(
        embedder: ProviderHandle<dyn EmbeddingProvider>,
        remote: ProviderHandle<dyn RemoteStore>,
        local: Arc<LocalCache>,
    ) -> Self {
        Self {
            embedder,
            remote,
            local,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// Override the vector-search similarity floor
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Store a memory and return its id.
    ///
    /// The memory goes to the remote store when one is configured and the
    /// write succeeds; otherwise it lands in the local cache.
    pub async fn store_memory(
        &self,
        content: &str,
        user_id: &str,
        context: &str,
        tags: Option<Vec<String>>,
        metadata: Option<MemoryMetadata>,
    ) -> String {
        let embedding = self.embed(content).await;
        let memory = Memory {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            context: context.to_string(),
            tags: tags.unwrap_or_default(),
            created_at: Utc::now(),
            metadata: metadata.unwrap_or_default(),
            embedding: (!embedding.is_empty()).then_some(embedding),
        };

        if let Some(remote) = self.remote.get() {
            match serde_json::to_value(&memory) {
                Ok(row) => match remote.upsert(Collection::Memories, row).await {
                    Ok(()) => {
                        tracing::info!(memory_id = %memory.id, "Stored memory remotely");
                        return memory.id;
                    }
                    Err(e) => tracing::warn!("Remote memory write failed, keeping it local: {}", e),
                },
                Err(e) => tracing::warn!("Failed to serialize memory {}: {}", memory.id, e),
            }
        }

        match self.local.upsert(&memory) {
            Ok(()) => tracing::info!(memory_id = %memory.id, "Stored memory locally"),
            Err(e) => tracing::warn!("Local memory write failed for {}: {}", memory.id, e),
        }
        memory.id
    }

    /// Store a profiled memory
    pub async fn store_new(&self, memory: NewMemory) -> String {
        self.store_memory(
            &memory.content,
            &memory.user_id,
            &memory.context,
            Some(memory.tags),
            Some(memory.metadata),
        )
        .await
    }

    /// Profile a journal entry and store it as a `diary_entry` memory
    pub async fn remember_entry(&self, content: &str, user_id: &str) -> String {
        self.store_new(profile_entry(content, user_id, DIARY_ENTRY_CONTEXT))
            .await
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Memories of `user_id` relevant to `query`, at most `limit`.
    ///
    /// Uses the remote nearest-neighbors search when an embedding and a
    /// remote store are available, otherwise the lexical fallback.
    pub async fn search_memories(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Vec<MemorySearchResult> {
        if limit == 0 {
            return Vec::new();
        }

        let Some(remote) = self.remote.get() else {
            return self.lexical_search(query, user_id, limit).await;
        };
        let embedding = self.embed(query).await;
        if embedding.is_empty() {
            tracing::debug!("No query embedding, using lexical search");
            return self.lexical_search(query, user_id, limit).await;
        }

        match remote
            .nearest_neighbors(&embedding, self.match_threshold, limit, user_id)
            .await
        {
            Ok(neighbors) => neighbors
                .into_iter()
                .filter_map(|n| match serde_json::from_value::<Memory>(n.record) {
                    Ok(memory) => Some(MemorySearchResult::new(memory, n.similarity)),
                    Err(e) => {
                        tracing::warn!("Skipping malformed memory row: {}", e);
                        None
                    }
                })
                .take(limit)
                .collect(),
            Err(e) => {
                tracing::warn!("Vector search failed, using lexical search: {}", e);
                self.lexical_search(query, user_id, limit).await
            }
        }
    }

    /// Case-insensitive substring match on content or exact tag match,
    /// newest first.
    pub async fn lexical_search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Vec<MemorySearchResult> {
        let query = query.trim();
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<Memory> = Vec::new();
        if let Some(remote) = self.remote.get() {
            match remote
                .list_by_owner(Collection::Memories, Some(user_id))
                .await
            {
                Ok(rows) => candidates.extend(decode_rows::<Memory>(rows)),
                Err(e) => tracing::warn!("Remote memory listing failed: {}", e),
            }
        }
        candidates.extend(self.local.list_for_owner::<Memory>(Some(user_id)));

        let mut seen = HashSet::new();
        let mut hits: Vec<Memory> = candidates
            .into_iter()
            .filter(|m| m.user_id == user_id)
            .filter(|m| seen.insert(m.id.clone()))
            .filter(|m| {
                m.content.to_lowercase().contains(&needle)
                    || m.tags.iter().any(|t| t == query)
            })
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(limit);

        hits.into_iter().map(MemorySearchResult::lexical).collect()
    }

    // =========================================================================
    // Context
    // =========================================================================

    /// Search with `content` and assemble the result into a context
    pub async fn get_memory_context(
        &self,
        content: &str,
        user_id: &str,
        max_memories: usize,
    ) -> MemoryContext {
        let results = self.search_memories(content, user_id, max_memories).await;
        tracing::debug!(user_id, hits = results.len(), "Assembled memory context");
        build_context(&results)
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        let Some(embedder) = self.embedder.get() else {
            return Vec::new();
        };
        match embedder.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Embedding via {} failed: {}", embedder.name(), e);
                Vec::new()
            }
        }
    }
}
