//! Local cache with whole-collection JSON files
//!
//! Directory layout:
//! ```text
//! ~/.diarykeep/
//! ├── documents.json
//! ├── insights.json
//! ├── insights.deleted.json
//! └── memories.json
//! ```
//!
//! Each file holds the full array of one collection, decoded row by row so
//! one malformed row never hides the others. `<name>.deleted.json` lists ids
//! deleted locally whose remote delete has not gone through yet.
//!
//! Access is synchronous and in-process; writes replace the whole file
//! through a temporary sibling and a rename, so a crash never leaves a
//! half-written collection behind.

use super::{Collection, Record};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Local key-value cache, one JSON file per collection
pub struct LocalCache {
    base_dir: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl LocalCache {
    /// Open (and create if needed) a cache rooted at `base_dir`
    pub fn open(base_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Default base directory (~/.diarykeep/)
    pub fn default_dir() -> PathBuf {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".diarykeep")
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.base_dir.join(format!("{}.json", collection.name()))
    }

    fn tombstone_path_for(&self, collection: Collection) -> PathBuf {
        self.base_dir
            .join(format!("{}.deleted.json", collection.name()))
    }

    // =========================================================================
    // Whole-collection access
    // =========================================================================

    /// Raw rows of a collection.
    ///
    /// A missing or empty file is an empty collection. An unreadable file or
    /// one that is not a JSON array is an error, so callers that rewrite the
    /// file never replace it with less than it held.
    fn read_rows(&self, path: &Path) -> Result<Vec<Value>> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if data.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&data)
            .map_err(|e| Error::Storage(format!("Failed to parse {}: {}", path.display(), e)))
    }

    fn write_json<S: Serialize + ?Sized>(&self, path: &Path, value: &S) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Storage(format!("Invalid cache path {}", path.display())))?;
        let tmp = self.base_dir.join(format!(".{}.tmp", file_name));
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load every record of a collection.
    ///
    /// A missing file is an empty collection. A corrupt file is logged and
    /// treated as empty; rows that do not decode as `T` are logged and
    /// skipped.
    pub fn load_all<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        let path = self.path_for(collection);
        let rows = match self.read_rows(&path) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", collection, e);
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| match serde_json::from_value::<T>(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Skipping malformed {} row in {}: {}", collection, path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Replace a collection with `items`
    pub fn save_all<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<()> {
        self.write_json(&self.path_for(collection), items)
    }

    // =========================================================================
    // Record helpers
    // =========================================================================

    /// Insert or replace a record by id
    pub fn upsert<T: Record>(&self, record: &T) -> Result<()> {
        self.upsert_many(std::slice::from_ref(record))
    }

    /// Insert or replace several records by id.
    ///
    /// Works on raw rows: rows this version cannot decode are kept as they
    /// are. Fails without writing when the existing file cannot be parsed.
    pub fn upsert_many<T: Record>(&self, records: &[T]) -> Result<()> {
        let _guard = self.lock()?;
        let path = self.path_for(T::COLLECTION);
        let mut rows = self.read_rows(&path)?;
        for record in records {
            let row = serde_json::to_value(record)?;
            match rows.iter_mut().find(|r| row_id(r) == Some(record.id())) {
                Some(existing) => *existing = row,
                None => rows.push(row),
            }
        }
        self.write_json(&path, &rows)
    }

    /// Remove a record by id. Returns whether it existed.
    pub fn remove<T: Record>(&self, id: &str) -> Result<bool> {
        let _guard = self.lock()?;
        let path = self.path_for(T::COLLECTION);
        let mut rows = self.read_rows(&path)?;
        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        if rows.len() == before {
            return Ok(false);
        }
        self.write_json(&path, &rows)?;
        Ok(true)
    }

    pub fn find<T: Record>(&self, id: &str) -> Option<T> {
        self.load_all::<T>(T::COLLECTION)
            .into_iter()
            .find(|r| r.id() == id)
    }

    /// Records for an owner (all records when `owner` is `None`), newest first
    pub fn list_for_owner<T: Record>(&self, owner: Option<&str>) -> Vec<T> {
        let mut items: Vec<T> = self
            .load_all::<T>(T::COLLECTION)
            .into_iter()
            .filter(|r| owner.is_none() || r.owner_id() == owner)
            .collect();
        items.sort_by(|a, b| b.sort_time().cmp(&a.sort_time()));
        items
    }

    // =========================================================================
    // Tombstones
    // =========================================================================

    /// Ids deleted locally whose remote delete is still pending
    pub fn tombstones(&self, collection: Collection) -> HashSet<String> {
        match self.read_tombstones(collection) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!("Failed to load {} tombstones: {}", collection, e);
                HashSet::new()
            }
        }
    }

    pub fn is_tombstoned(&self, collection: Collection, id: &str) -> bool {
        self.tombstones(collection).contains(id)
    }

    /// Remember that `id` is deleted locally but may still exist remotely
    pub fn add_tombstone(&self, collection: Collection, id: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut ids = self.read_tombstones(collection)?;
        if ids.iter().any(|t| t == id) {
            return Ok(());
        }
        ids.push(id.to_string());
        self.write_json(&self.tombstone_path_for(collection), &ids)
    }

    /// Forget a tombstone. No-op when `id` has none.
    pub fn clear_tombstone(&self, collection: Collection, id: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut ids = self.read_tombstones(collection)?;
        let before = ids.len();
        ids.retain(|t| t != id);
        if ids.len() == before {
            return Ok(());
        }
        self.write_json(&self.tombstone_path_for(collection), &ids)
    }

    fn read_tombstones(&self, collection: Collection) -> Result<Vec<String>> {
        self.read_rows(&self.tombstone_path_for(collection))?
            .into_iter()
            .map(|v| match v {
                Value::String(id) => Ok(id),
                other => Err(Error::Storage(format!("Invalid tombstone {}", other))),
            })
            .collect()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Storage("local cache lock poisoned".to_string()))
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        owner: String,
        body: String,
        created_at: DateTime<Utc>,
    }

    impl Record for Note {
        const COLLECTION: Collection = Collection::Memories;

        fn id(&self) -> &str {
            &self.id
        }

        fn owner_id(&self) -> Option<&str> {
            Some(&self.owner)
        }

        fn sort_time(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    fn note(id: &str, owner: &str, minutes_ago: i64) -> Note {
        Note {
            id: id.to_string(),
            owner: owner.to_string(),
            body: format!("note {}", id),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn make_cache() -> (LocalCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::open(dir.path().to_path_buf()).unwrap();
        (cache, dir)
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let (cache, _dir) = make_cache();
        let items: Vec<Note> = cache.load_all(Collection::Memories);
        assert!(items.is_empty());
    }

    #[test]
    fn test_save_of_load_is_noop() {
        let (cache, _dir) = make_cache();
        cache
            .save_all(Collection::Memories, &[note("a", "u1", 2), note("b", "u1", 1)])
            .unwrap();

        let path = cache.path_for(Collection::Memories);
        let before = std::fs::read_to_string(&path).unwrap();

        let loaded: Vec<Note> = cache.load_all(Collection::Memories);
        cache.save_all(Collection::Memories, &loaded).unwrap();

        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(before, after);
        let reloaded: Vec<Note> = cache.load_all(Collection::Memories);
        assert_eq!(loaded, reloaded);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let (cache, _dir) = make_cache();
        std::fs::write(cache.path_for(Collection::Memories), "{not json").unwrap();
        let items: Vec<Note> = cache.load_all(Collection::Memories);
        assert!(items.is_empty());
    }

    #[test]
    fn test_undecodable_rows_survive_upsert() {
        let (cache, _dir) = make_cache();
        let keep = serde_json::to_value(note("keep", "u1", 5)).unwrap();
        let legacy = serde_json::json!({"id": "legacy", "owner": "u1"});
        std::fs::write(
            cache.path_for(Collection::Memories),
            serde_json::to_string(&vec![keep, legacy]).unwrap(),
        )
        .unwrap();

        let items: Vec<Note> = cache.load_all(Collection::Memories);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "keep");

        cache.upsert(&note("fresh", "u1", 0)).unwrap();

        let ids: Vec<String> = cache
            .load_all::<Note>(Collection::Memories)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["keep", "fresh"]);

        let raw: Vec<Value> = serde_json::from_str(
            &std::fs::read_to_string(cache.path_for(Collection::Memories)).unwrap(),
        )
        .unwrap();
        assert_eq!(raw.len(), 3);
        assert!(raw.iter().any(|r| r["id"] == "legacy"));
    }

    #[test]
    fn test_write_refuses_to_replace_unparsable_file() {
        let (cache, _dir) = make_cache();
        let path = cache.path_for(Collection::Memories);
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            cache.upsert(&note("a", "u1", 0)),
            Err(Error::Storage(_))
        ));
        assert!(matches!(cache.remove::<Note>("a"), Err(Error::Storage(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn test_tombstones() {
        let (cache, _dir) = make_cache();
        assert!(cache.tombstones(Collection::Insights).is_empty());

        cache.add_tombstone(Collection::Insights, "i1").unwrap();
        cache.add_tombstone(Collection::Insights, "i1").unwrap();
        assert!(cache.is_tombstoned(Collection::Insights, "i1"));
        assert_eq!(cache.tombstones(Collection::Insights).len(), 1);
        assert!(!cache.is_tombstoned(Collection::Memories, "i1"));

        cache.clear_tombstone(Collection::Insights, "i1").unwrap();
        assert!(!cache.is_tombstoned(Collection::Insights, "i1"));
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let (cache, _dir) = make_cache();
        let mut first = note("a", "u1", 0);
        cache.upsert(&first).unwrap();
        first.body = "edited".to_string();
        cache.upsert(&first).unwrap();

        let items: Vec<Note> = cache.load_all(Collection::Memories);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].body, "edited");
    }

    #[test]
    fn test_remove() {
        let (cache, _dir) = make_cache();
        cache.upsert(&note("a", "u1", 0)).unwrap();
        assert!(cache.remove::<Note>("a").unwrap());
        assert!(!cache.remove::<Note>("a").unwrap());
        assert!(cache.find::<Note>("a").is_none());
    }

    #[test]
    fn test_list_for_owner_newest_first() {
        let (cache, _dir) = make_cache();
        cache
            .upsert_many(&[note("old", "u1", 10), note("new", "u1", 1), note("other", "u2", 0)])
            .unwrap();

        let items: Vec<Note> = cache.list_for_owner(Some("u1"));
        let ids: Vec<&str> = items.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let all: Vec<Note> = cache.list_for_owner(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "other");
    }

    #[test]
    fn test_locked_upserts_keep_every_record() {
        let (cache, _dir) = make_cache();
        let cache = std::sync::Arc::new(cache);
        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                cache.upsert(&note(&format!("n{}", i), "u1", i)).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let items: Vec<Note> = cache.load_all(Collection::Memories);
        assert_eq!(items.len(), 8);
    }
}
