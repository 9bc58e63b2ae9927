//! # Remote Document Store
//!
//! The seam between the sync engine and whatever backs the shared store.
//!
//! ## Store Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Remote Document Store                          │
//! │                                                                     │
//! │  collection "products"          collection "invoices"               │
//! │  ┌──────────────────────┐       ┌──────────────────────┐            │
//! │  │ "1"  → { json doc }  │       │ "42" → { json doc }  │            │
//! │  │ "2"  → { json doc }  │       │ "43" → { json doc }  │            │
//! │  │ ...                  │       │ ...                  │            │
//! │  └──────────────────────┘       └──────────────────────┘            │
//! │                                                                     │
//! │  • Keys are local ids rendered as decimal strings                   │
//! │  • Upserts MERGE object fields: fields absent from the pushed       │
//! │    document survive on the remote copy                              │
//! │  • A batch either fully applies or fully fails                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine only ever talks to [`RemoteStore`]; production wires in a real
//! backend, tests use [`InMemoryRemoteStore`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::{SyncError, SyncResult};

/// A remote document store the engine can push to and pull from.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches one document by key. `Ok(None)` means the document is absent.
    async fn get(&self, collection: &str, key: &str) -> SyncResult<Option<Value>>;

    /// Lists every document in a collection as `(key, document)` pairs.
    async fn list_all(&self, collection: &str) -> SyncResult<Vec<(String, Value)>>;

    /// Upserts a batch of documents atomically, merging object fields into
    /// any existing document under the same key.
    async fn batch_upsert(&self, collection: &str, docs: Vec<(String, Value)>) -> SyncResult<()>;
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

/// In-memory [`RemoteStore`] with failure injection, for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
    /// When set, every operation fails until cleared.
    offline: AtomicBool,
}

impl InMemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing (or regaining) connectivity.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Seeds a document directly, bypassing merge semantics.
    pub async fn seed(&self, collection: &str, key: &str, doc: Value) {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), doc);
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, HashMap::len)
    }

    /// True if a collection holds no documents.
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    fn check_online(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Remote("store unreachable".to_string()));
        }
        Ok(())
    }
}

/// Merges `incoming` object fields into `existing`, field by field. Non-object
/// values replace wholesale.
fn merge_into(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(base), Value::Object(update)) => {
            for (key, value) in update {
                base.insert(key, value);
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, collection: &str, key: &str) -> SyncResult<Option<Value>> {
        self.check_online()?;

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn list_all(&self, collection: &str) -> SyncResult<Vec<(String, Value)>> {
        self.check_online()?;

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn batch_upsert(&self, collection: &str, docs: Vec<(String, Value)>) -> SyncResult<()> {
        self.check_online()?;

        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();

        for (key, doc) in docs {
            match target.get_mut(&key) {
                Some(existing) => merge_into(existing, doc),
                None => {
                    target.insert(key, doc);
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
