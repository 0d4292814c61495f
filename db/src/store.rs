//! The document-store contract and an in-memory implementation.
//!
//! Persistence is an external collaborator: records live in a
//! document-oriented store addressed by `(collection, key)` where keys are
//! composite identifiers like `studentId_subjectId`. The core only issues
//! single-document operations; `merge` follows set-with-merge semantics
//! (object fields merge recursively, everything else is replaced).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{key} not found")]
    NotFound { collection: String, key: String },
    #[error("document serialization failed: {0}")]
    Serialization(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Joins identifier parts into a composite document key.
pub fn composite_key(parts: &[&str]) -> String {
    parts.join("_")
}

/// Single-document operations against the external store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;
    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<(), StoreError>;
    /// Set-with-merge: creates the document when absent.
    async fn merge(&self, collection: &str, key: &str, patch: Value) -> Result<(), StoreError>;
    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;
    /// All documents in one collection, in key order.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;
}

fn merge_value(existing: &mut Value, patch: Value) {
    match (existing, patch) {
        (Value::Object(existing_map), Value::Object(patch_map)) => {
            for (key, patch_field) in patch_map {
                match existing_map.get_mut(&key) {
                    Some(existing_field) => merge_value(existing_field, patch_field),
                    None => {
                        existing_map.insert(key, patch_field);
                    }
                }
            }
        }
        (existing, patch) => *existing = patch,
    }
}

/// In-memory document store backing services and tests.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
        Ok(())
    }

    async fn merge(&self, collection: &str, key: &str, patch: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(key) {
            Some(existing) => merge_value(existing, patch),
            None => {
                docs.insert(key.to_string(), patch);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(key);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, doc)| (key.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
