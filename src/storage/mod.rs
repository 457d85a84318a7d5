//! Dual-tier persistence
//!
//! Records live in two tiers: an optional remote store reached over HTTP and
//! a local cache of whole-collection JSON files. The
//! [`PersistenceCoordinator`] decides which tier serves each operation.

pub mod coordinator;
pub mod local;
pub mod remote;

pub use coordinator::{PersistenceCoordinator, SyncReport};
pub use local::LocalCache;
pub use remote::{remote_from_config, InMemoryRemoteStore, Neighbor, RemoteStore, RestRemoteStore};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Named collection of records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Documents,
    Insights,
    Memories,
}

impl Collection {
    /// Table / file name
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Documents => "documents",
            Collection::Insights => "insights",
            Collection::Memories => "memories",
        }
    }

    /// Column tying a record to its owner, if the collection is owned
    pub fn owner_column(&self) -> Option<&'static str> {
        match self {
            Collection::Documents => None,
            Collection::Insights => Some("document_id"),
            Collection::Memories => Some("user_id"),
        }
    }

    /// Column listings are ordered by (newest first)
    pub fn order_column(&self) -> &'static str {
        match self {
            Collection::Documents => "updated_at",
            _ => "created_at",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A record persisted by both tiers
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this record type lives in
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Owner key matching [`Collection::owner_column`]
    fn owner_id(&self) -> Option<&str>;

    /// Timestamp listings sort by
    fn sort_time(&self) -> DateTime<Utc>;
}
