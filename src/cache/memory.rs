//! In-process cache namespaces

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::CacheError;
use crate::worker::CacheStore;
use crate::worker::types::Response;

type Namespaces = BTreeMap<String, BTreeMap<String, Response>>;

/// Cache namespaces held in memory for the lifetime of the process
#[derive(Default)]
pub struct MemoryCacheStore {
    namespaces: Mutex<Namespaces>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Namespaces>, CacheError> {
        self.namespaces.lock().map_err(|_| CacheError::Poisoned)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        Ok(self.lock()?.remove(namespace).is_some())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Response>, CacheError> {
        Ok(self
            .lock()?
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<(), CacheError> {
        self.lock()?
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .lock()?
            .get_mut(namespace)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .lock()?
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}
