//! Remote store
//!
//! The remote tier speaks in untyped JSON rows so one client serves every
//! collection. [`RestRemoteStore`] talks to a PostgREST endpoint
//! (`/rest/v1/<table>` plus `/rest/v1/rpc/<function>` for vector search).
//! [`InMemoryRemoteStore`] keeps rows in memory and can simulate an outage.

use super::Collection;
use crate::config::{resolve_env_ref, timeout_from_secs, RemoteConfig};
use crate::error::{Error, Result};
use crate::providers::ProviderHandle;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A row returned by a similarity search
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub record: Value,
    pub similarity: f32,
}

/// Remote persistence tier
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert or replace a row by its `id`
    async fn upsert(&self, collection: Collection, row: Value) -> Result<()>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Rows for an owner (every row when `owner` is `None`), newest first
    async fn list_by_owner(&self, collection: Collection, owner: Option<&str>)
        -> Result<Vec<Value>>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Memories of `user_id` whose embedding similarity to `embedding` is at
    /// least `threshold`, most similar first
    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        user_id: &str,
    ) -> Result<Vec<Neighbor>>;
}

// =============================================================================
// PostgREST client
// =============================================================================

/// Remote store backed by a PostgREST HTTP API
pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    match_function: String,
}

impl RestRemoteStore {
    /// Create a client for the project at `url`
    pub fn new(config: &RemoteConfig, url: &str, api_key: String) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout_from_secs(config.timeout_secs) {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build remote store client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            api_key,
            match_function: config.match_function.clone(),
        })
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.base_url, collection.name())
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn rows(&self, request: reqwest::RequestBuilder) -> Result<Vec<Value>> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Storage(format!("Failed to parse remote rows: {}", e)))
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn upsert(&self, collection: Collection, row: Value) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(collection))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        self.send(request).await?;
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let request = self
            .client
            .get(self.table_url(collection))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        Ok(self.rows(request).await?.into_iter().next())
    }

    async fn list_by_owner(
        &self,
        collection: Collection,
        owner: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut query = vec![
            ("select".to_string(), "*".to_string()),
            (
                "order".to_string(),
                format!("{}.desc", collection.order_column()),
            ),
        ];
        if let (Some(column), Some(owner)) = (collection.owner_column(), owner) {
            query.push((column.to_string(), format!("eq.{}", owner)));
        }
        let request = self.client.get(self.table_url(collection)).query(&query);
        self.rows(request).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table_url(collection))
            .query(&[("id", format!("eq.{}", id))]);
        self.send(request).await?;
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        user_id: &str,
    ) -> Result<Vec<Neighbor>> {
        let body = serde_json::json!({
            "query_embedding": embedding,
            "match_threshold": threshold,
            "match_count": limit,
            "user_id": user_id,
        });
        let request = self
            .client
            .post(format!("{}/rpc/{}", self.base_url, self.match_function))
            .json(&body);

        Ok(self
            .rows(request)
            .await?
            .into_iter()
            .map(|row| {
                let similarity = row
                    .get("similarity")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as f32;
                Neighbor {
                    record: row,
                    similarity,
                }
            })
            .collect())
    }
}

/// Build the REST remote store when both its URL and key are set
pub fn remote_from_config(config: &RemoteConfig) -> ProviderHandle<dyn RemoteStore> {
    let (Some(url), Some(key)) = (
        resolve_env_ref(&config.url_ref),
        resolve_env_ref(&config.key_ref),
    ) else {
        return ProviderHandle::unconfigured(format!(
            "remote store not configured (set ${} and ${})",
            config.url_ref.to_uppercase(),
            config.key_ref.to_uppercase()
        ));
    };
    match RestRemoteStore::new(config, &url, key) {
        Ok(store) => ProviderHandle::configured(Arc::new(store) as Arc<dyn RemoteStore>),
        Err(e) => ProviderHandle::unconfigured(e.to_string()),
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Remote store held in process memory
///
/// Used for tests and offline demos. `set_reachable(false)` makes every call
/// fail with [`Error::StoreUnavailable`].
pub struct InMemoryRemoteStore {
    tables: RwLock<HashMap<Collection, Vec<Value>>>,
    reachable: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Toggle simulated reachability
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of calls made against this store
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every row of a collection, in insertion order
    pub async fn rows(&self, collection: Collection) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("remote store unreachable".to_string()))
        }
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn row_str<'a>(row: &'a Value, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn upsert(&self, collection: Collection, row: Value) -> Result<()> {
        self.enter()?;
        let id = row_id(&row)
            .ok_or_else(|| Error::Storage("row has no id".to_string()))?
            .to_string();
        let mut tables = self.tables.write().await;
        let table = tables.entry(collection).or_default();
        match table.iter_mut().find(|r| row_id(r) == Some(id.as_str())) {
            Some(existing) => *existing = row,
            None => table.push(row),
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        self.enter()?;
        Ok(self
            .tables
            .read()
            .await
            .get(&collection)
            .and_then(|t| t.iter().find(|r| row_id(r) == Some(id)).cloned()))
    }

    async fn list_by_owner(
        &self,
        collection: Collection,
        owner: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.enter()?;
        let order = collection.order_column();
        let mut rows: Vec<Value> = self
            .tables
            .read()
            .await
            .get(&collection)
            .map(|t| {
                t.iter()
                    .filter(|r| match (collection.owner_column(), owner) {
                        (Some(column), Some(owner)) => row_str(r, column) == Some(owner),
                        _ => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // RFC 3339 UTC timestamps sort lexically
        rows.sort_by(|a, b| row_str(b, order).cmp(&row_str(a, order)));
        Ok(rows)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.enter()?;
        if let Some(table) = self.tables.write().await.get_mut(&collection) {
            table.retain(|r| row_id(r) != Some(id));
        }
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        user_id: &str,
    ) -> Result<Vec<Neighbor>> {
        self.enter()?;
        let tables = self.tables.read().await;
        let mut neighbors: Vec<Neighbor> = tables
            .get(&Collection::Memories)
            .map(|t| t.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|r| row_str(r, "user_id") == Some(user_id))
            .filter_map(|r| {
                let stored: Vec<f32> = r
                    .get("embedding")
                    .and_then(|e| serde_json::from_value(e.clone()).ok())?;
                let similarity = cosine_similarity(embedding, &stored);
                (similarity >= threshold).then(|| Neighbor {
                    record: r.clone(),
                    similarity,
                })
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(limit);
        Ok(neighbors)
    }
}
