//! Memory data types
//!
//! A [`Memory`] is an excerpt of journal content plus derived tags, written
//! once and never updated. Search results and contexts are derived per call
//! and never persisted.

use crate::storage::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted excerpt of user content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique memory identifier
    pub id: String,
    /// Owner of the memory
    pub user_id: String,
    /// The remembered text
    pub content: String,
    /// Where the memory came from (e.g. `diary_entry`)
    pub context: String,
    /// Topic and category tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MemoryMetadata,
    /// Embedding vector, absent when the provider was unavailable
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_embedding"
    )]
    pub embedding: Option<Vec<f32>>,
}

/// Accept an embedding as a JSON array or as the `"[0.1,0.2]"` text form
/// vector columns are returned in.
fn deserialize_embedding<'de, D>(deserializer: D) -> Result<Option<Vec<f32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Vector(Vec<f32>),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Vector(v)) => Ok(Some(v)),
        Some(Raw::Text(text)) => serde_json::from_str(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl Record for Memory {
    const COLLECTION: Collection = Collection::Memories;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }

    fn sort_time(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Structural facts derived from the memory's source text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryMetadata {
    pub word_count: usize,
    pub categories: Vec<String>,
    pub has_goals: bool,
    pub has_challenges: bool,
    pub has_achievements: bool,
}

/// A memory that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub user_id: String,
    pub content: String,
    pub context: String,
    pub tags: Vec<String>,
    pub metadata: MemoryMetadata,
}

/// Relevance bucket of a similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    /// Bucket a similarity: `> 0.8` high, `> 0.6` medium, otherwise low
    pub fn from_similarity(similarity: f32) -> Self {
        if similarity > 0.8 {
            Relevance::High
        } else if similarity > 0.6 {
            Relevance::Medium
        } else {
            Relevance::Low
        }
    }
}

/// Similarity reported for lexical fallback hits
pub const LEXICAL_SIMILARITY: f32 = 0.5;

/// One memory returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySearchResult {
    pub memory: Memory,
    pub similarity: f32,
    pub relevance: Relevance,
}

impl MemorySearchResult {
    /// Build a result, deriving relevance from similarity
    pub fn new(memory: Memory, similarity: f32) -> Self {
        Self {
            memory,
            similarity,
            relevance: Relevance::from_similarity(similarity),
        }
    }

    /// A lexical match. No graded score exists, so every hit is pinned to
    /// [`LEXICAL_SIMILARITY`] and medium relevance.
    pub fn lexical(memory: Memory) -> Self {
        Self {
            memory,
            similarity: LEXICAL_SIMILARITY,
            relevance: Relevance::Medium,
        }
    }
}

/// Memory-derived conditioning for one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryContext {
    /// High-relevance memories, in search order
    pub relevant_memories: Vec<Memory>,
    pub summary: String,
    /// At most three prompts for reflection
    pub suggestions: Vec<String>,
}

impl MemoryContext {
    /// Context for a search that found nothing
    pub fn empty() -> Self {
        Self {
            relevant_memories: Vec::new(),
            summary: super::context::NO_MEMORIES_SUMMARY.to_string(),
            suggestions: Vec::new(),
        }
    }

    /// Whether the summary carries actual memories
    pub fn has_memories(&self) -> bool {
        self.summary != super::context::NO_MEMORIES_SUMMARY
    }
}
