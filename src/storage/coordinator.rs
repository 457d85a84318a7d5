//! Persistence coordinator
//!
//! Routing rules for one record type across the two tiers:
//!
//! | Operation | Remote                       | Local                    |
//! |-----------|------------------------------|--------------------------|
//! | write     | best-effort                  | always (errors surface)  |
//! | read      | only while local is empty    | first, wins if non-empty |
//! | get       | fallback on local miss       | first                    |
//! | delete    | best-effort, tombstone kept  | always                   |
//! | bulk sync | pending deletes, then every  | full set                 |
//! |           | record, failures kept        |                          |
//!
//! Remote failures are logged and never fail the caller, so a remote
//! outage never blocks local deletion. A delete the remote store missed
//! leaves a local tombstone that hides the remote row from reads until a
//! later sync removes it.

use super::local::LocalCache;
use super::remote::RemoteStore;
use super::Record;
use crate::error::Result;
use crate::providers::ProviderHandle;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Outcome of a bulk sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records accepted by the remote store
    pub synced: usize,
    /// Pending deletes the remote store accepted
    pub deleted: usize,
    /// Ids the remote store rejected
    pub failed: Vec<String>,
}

/// Routes reads and writes of `T` across the remote and local tiers
pub struct PersistenceCoordinator<T: Record> {
    local: Arc<LocalCache>,
    remote: ProviderHandle<dyn RemoteStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for PersistenceCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            local: Arc::clone(&self.local),
            remote: self.remote.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> PersistenceCoordinator<T> {
    pub fn new(local: Arc<LocalCache>, remote: ProviderHandle<dyn RemoteStore>) -> Self {
        Self {
            local,
            remote,
            _record: PhantomData,
        }
    }

    /// Whether a remote tier is configured
    pub fn has_remote(&self) -> bool {
        self.remote.is_configured()
    }

    /// Write to the remote store (best-effort), then the local cache.
    pub async fn write(&self, record: &T) -> Result<()> {
        if let Some(remote) = self.remote.get() {
            match serde_json::to_value(record) {
                Ok(row) => {
                    if let Err(e) = remote.upsert(T::COLLECTION, row).await {
                        tracing::warn!(
                            "Remote write of {} {} failed: {}",
                            T::COLLECTION,
                            record.id(),
                            e
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to serialize {} {}: {}", T::COLLECTION, record.id(), e)
                }
            }
        }
        self.local.upsert(record)?;
        self.local.clear_tombstone(T::COLLECTION, record.id())
    }

    /// Records for `owner`, newest first.
    ///
    /// The local cache wins once it holds anything for the owner. Only an
    /// empty local result consults the remote store, whose rows are returned
    /// as-is without being cached, minus tombstoned ids.
    pub async fn read_for_owner(&self, owner: Option<&str>) -> Vec<T> {
        let local = self.local.list_for_owner::<T>(owner);
        if !local.is_empty() {
            return local;
        }

        let Some(remote) = self.remote.get() else {
            return local;
        };

        match remote.list_by_owner(T::COLLECTION, owner).await {
            Ok(rows) => {
                let tombstones = self.local.tombstones(T::COLLECTION);
                decode_rows::<T>(rows)
                    .into_iter()
                    .filter(|r| !tombstones.contains(r.id()))
                    .collect()
            }
            Err(e) => {
                tracing::warn!("Remote read of {} failed: {}", T::COLLECTION, e);
                Vec::new()
            }
        }
    }

    /// A single record, local first
    pub async fn get(&self, id: &str) -> Option<T> {
        if let Some(record) = self.local.find::<T>(id) {
            return Some(record);
        }
        if self.local.is_tombstoned(T::COLLECTION, id) {
            return None;
        }

        let remote = self.remote.get()?;
        match remote.get(T::COLLECTION, id).await {
            Ok(Some(row)) => match serde_json::from_value::<T>(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping malformed remote {} {}: {}", T::COLLECTION, id, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Remote get of {} {} failed: {}", T::COLLECTION, id, e);
                None
            }
        }
    }

    /// Delete from the remote store (best-effort) and always from the local
    /// cache. A failed remote delete is tombstoned for the next sync.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if let Some(remote) = self.remote.get() {
            if let Err(e) = remote.delete(T::COLLECTION, id).await {
                tracing::warn!("Remote delete of {} {} failed: {}", T::COLLECTION, id, e);
                self.local.add_tombstone(T::COLLECTION, id)?;
            }
        }
        self.local.remove::<T>(id)?;
        Ok(())
    }

    /// Retry pending remote deletes, push every record to the remote store
    /// continuing past failures, then write the full set to the local cache.
    ///
    /// Without a remote store the local write still happens and every record
    /// is reported as failed.
    pub async fn bulk_sync(&self, records: &[T]) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        match self.remote.get() {
            Some(remote) => {
                for id in self.local.tombstones(T::COLLECTION) {
                    match remote.delete(T::COLLECTION, &id).await {
                        Ok(()) => {
                            self.local.clear_tombstone(T::COLLECTION, &id)?;
                            report.deleted += 1;
                        }
                        Err(e) => tracing::warn!(
                            "Pending delete of {} {} failed: {}",
                            T::COLLECTION,
                            id,
                            e
                        ),
                    }
                }
                for record in records {
                    let outcome = match serde_json::to_value(record) {
                        Ok(row) => remote.upsert(T::COLLECTION, row).await,
                        Err(e) => Err(e.into()),
                    };
                    match outcome {
                        Ok(()) => report.synced += 1,
                        Err(e) => {
                            tracing::warn!(
                                "Sync of {} {} failed: {}",
                                T::COLLECTION,
                                record.id(),
                                e
                            );
                            report.failed.push(record.id().to_string());
                        }
                    }
                }
            }
            None => {
                tracing::warn!("No remote store configured, {} kept local", T::COLLECTION);
                report.failed = records.iter().map(|r| r.id().to_string()).collect();
            }
        }

        self.local.upsert_many(records)?;

        tracing::info!(
            "Synced {} {} ({} failed, {} deletes)",
            report.synced,
            T::COLLECTION,
            report.failed.len(),
            report.deleted
        );
        Ok(report)
    }

    /// Everything in the local cache for `owner`, without touching the remote
    pub fn local_for_owner(&self, owner: Option<&str>) -> Vec<T> {
        self.local.list_for_owner::<T>(owner)
    }
}

/// Decode remote rows, skipping any that do not match the record shape
pub(crate) fn decode_rows<T: Record>(rows: Vec<serde_json::Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed remote {} row: {}", T::COLLECTION, e);
                None
            }
        })
        .collect()
}
