//! Diarykeep - memory-aware insight engine for a personal journal
//!
//! Diarykeep turns journal entries into reflective insights. Each entry can
//! be remembered as a searchable memory, and later insights are conditioned
//! on the memories most relevant to the entry at hand.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 DiaryService (CLI / HTTP API)                │
//! └──────────────┬───────────────────────────────┬───────────────┘
//!                │                               │
//! ┌──────────────▼──────────────┐   ┌────────────▼──────────────┐
//! │     Insight Orchestrator    │   │  Persistence Coordinator  │
//! │  - memory context           │   │  - remote best-effort     │
//! │  - prompt assembly          │   │  - local cache always     │
//! │  - metadata extraction      │   │  - bulk sync              │
//! └──────┬───────────────┬──────┘   └──────┬─────────────┬──────┘
//!        │               │                 │             │
//! ┌──────▼──────┐ ┌──────▼────────┐ ┌──────▼──────┐ ┌────▼────────┐
//! │ Completion  │ │ Memory Engine │ │ Remote store│ │ Local cache │
//! │ provider    │ │ - embeddings  │ │ (PostgREST) │ │ (JSON files)│
//! └─────────────┘ │ - vector /    │ └─────────────┘ └─────────────┘
//!                 │   lexical     │
//!                 └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`service`]: Caller-facing operations
//! - [`insight`]: Insight generation and metadata extraction
//! - [`memory`]: Memory storage, search and context assembly
//! - [`storage`]: Remote and local tiers and their coordinator
//! - [`providers`]: Completion and embedding providers
//! - [`api`]: HTTP API
//! - [`config`]: Configuration management

pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod insight;
pub mod memory;
pub mod providers;
pub mod sanitize;
pub mod service;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use config::DiaryConfig;
pub use document::Document;
pub use error::{Error, Result};
pub use insight::{Insight, InsightRequest, InsightResponse};
pub use memory::{Memory, MemoryContext, MemorySearchResult};
pub use service::{DiaryService, DiaryServiceBuilder};
