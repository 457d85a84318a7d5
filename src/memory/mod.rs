//! Memory system
//!
//! Memories are excerpts of journal entries kept to condition future
//! insights. The [`MemoryEngine`] stores them and finds relevant ones again;
//! [`context`] turns search results into a [`MemoryContext`].

pub mod context;
pub mod engine;
pub mod profile;
pub mod types;

pub use context::NO_MEMORIES_SUMMARY;
pub use engine::MemoryEngine;
pub use profile::{profile_entry, DIARY_ENTRY_CONTEXT};
pub use types::{
    Memory, MemoryContext, MemoryMetadata, MemorySearchResult, NewMemory, Relevance,
};
