//! Host capabilities injected into the worker
//!
//! Each trait mirrors one platform API the browser worker relies on, so the
//! handlers can run against the CLI host or against fakes in tests.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::types::{
    ClientMessage, Notification, NotificationRecord, Request, Response, WindowClient,
};
use crate::error::{CacheError, NetworkError, Result, ScheduleError};

/// Named cache namespaces persisted by the host
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Names of every namespace that exists
    async fn namespaces(&self) -> std::result::Result<Vec<String>, CacheError>;

    /// Delete a namespace with all its entries
    async fn delete_namespace(&self, namespace: &str) -> std::result::Result<bool, CacheError>;

    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> std::result::Result<Option<Response>, CacheError>;

    /// Insert or replace an entry, creating the namespace if needed
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: &Response,
    ) -> std::result::Result<(), CacheError>;

    async fn remove(&self, namespace: &str, key: &str) -> std::result::Result<bool, CacheError>;

    /// Request keys stored in a namespace
    async fn keys(&self, namespace: &str) -> std::result::Result<Vec<String>, CacheError>;

    /// First match for `key` across the given namespaces, in order
    async fn match_any(
        &self,
        namespaces: &[&str],
        key: &str,
    ) -> std::result::Result<Option<Response>, CacheError> {
        for namespace in namespaces {
            if let Some(hit) = self.get(namespace, key).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

/// Network access
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch a request. Any HTTP status is a successful fetch; only transport
    /// failures are errors.
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, NetworkError>;
}

/// Notification display and scheduling
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Display immediately, replacing anything shown under the same tag
    async fn show(&self, notification: &Notification) -> Result<()>;

    /// Schedule an OS-level trigger for a local wall-clock instant
    async fn schedule(
        &self,
        notification: &Notification,
        at: NaiveDateTime,
    ) -> std::result::Result<(), ScheduleError>;

    /// Displayed and pending notifications carrying `tag`
    async fn notifications(&self, tag: &str) -> Result<Vec<NotificationRecord>>;

    /// Close displayed and cancel pending notifications carrying `tag`
    async fn close(&self, tag: &str) -> Result<usize>;

    /// Close displayed notifications carrying `tag`, leaving pending
    /// triggers in place
    async fn dismiss(&self, tag: &str) -> Result<usize>;
}

/// Open application windows
#[async_trait]
pub trait ClientHub: Send + Sync {
    async fn windows(&self) -> Result<Vec<WindowClient>>;

    async fn post_message(&self, client: &WindowClient, message: &ClientMessage) -> Result<()>;

    async fn focus(&self, client: &WindowClient) -> Result<()>;

    async fn open_window(&self, url: &str) -> Result<WindowClient>;
}

/// Local wall clock
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}
