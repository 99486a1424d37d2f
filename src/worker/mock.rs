//! Fake host backends for testing
//!
//! Every fake records what the worker did to it so tests can assert on side
//! effects without a browser, a network or a clock.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::backend::{ClientHub, Clock, Network, Notifier};
use super::scheduler::SNOOZE_KEY;
use super::types::{
    ClientMessage, Notification, NotificationRecord, Request, Response, WindowClient,
};
use super::{Backends, CacheStore, Router, Scheduler, Worker};
use crate::cache::MemoryCacheStore;
use crate::config::WorkerConfig;
use crate::error::{CacheError, NetworkError, Result, ScheduleError};
use crate::manifest::Manifest;

/// Network that answers only scripted URLs; everything else is unreachable.
#[derive(Default)]
pub struct FakeNetwork {
    responses: Mutex<HashMap<String, Response>>,
    calls: AtomicUsize,
}

impl FakeNetwork {
    /// Script the response for a URL
    pub fn respond(&self, url: &str, response: Response) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    /// Number of fetches attempted
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| NetworkError::Unreachable(format!("offline: {}", request.url)))
    }
}

/// In-memory store whose Nth `put` fails, counting every put since creation
pub struct FlakyCacheStore {
    inner: MemoryCacheStore,
    puts: AtomicUsize,
    fail_on: usize,
}

impl FlakyCacheStore {
    pub fn failing_on_put(fail_on: usize) -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            puts: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl CacheStore for FlakyCacheStore {
    async fn namespaces(&self) -> std::result::Result<Vec<String>, CacheError> {
        self.inner.namespaces().await
    }

    async fn delete_namespace(&self, namespace: &str) -> std::result::Result<bool, CacheError> {
        self.inner.delete_namespace(namespace).await
    }

    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> std::result::Result<Option<Response>, CacheError> {
        self.inner.get(namespace, key).await
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: &Response,
    ) -> std::result::Result<(), CacheError> {
        if self.puts.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(CacheError::Io("disk full".to_string()));
        }
        self.inner.put(namespace, key, response).await
    }

    async fn remove(&self, namespace: &str, key: &str) -> std::result::Result<bool, CacheError> {
        self.inner.remove(namespace, key).await
    }

    async fn keys(&self, namespace: &str) -> std::result::Result<Vec<String>, CacheError> {
        self.inner.keys(namespace).await
    }
}

/// Notifier recording displayed and scheduled notifications
pub struct FakeNotifier {
    triggers_supported: AtomicBool,
    records: Mutex<Vec<NotificationRecord>>,
    history: Mutex<Vec<(Notification, NaiveDateTime)>>,
    closed: Mutex<Vec<String>>,
}

impl Default for FakeNotifier {
    fn default() -> Self {
        Self {
            triggers_supported: AtomicBool::new(true),
            records: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        }
    }
}

impl FakeNotifier {
    /// Currently pending triggers
    pub fn scheduled(&self) -> Vec<(Notification, NaiveDateTime)> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.trigger.map(|at| (r.notification.clone(), at)))
            .collect()
    }

    /// Every trigger ever scheduled
    pub fn scheduled_history(&self) -> Vec<(Notification, NaiveDateTime)> {
        self.history.lock().unwrap().clone()
    }

    /// Currently displayed notifications
    pub fn displayed(&self) -> Vec<Notification> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.trigger.is_none())
            .map(|r| r.notification.clone())
            .collect()
    }

    /// Tags passed to `close`, in call order
    pub fn closed_tags(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    /// Pretend a notification was left on screen by an earlier activation
    pub fn preload_displayed(&self, tag: &str) {
        self.records.lock().unwrap().push(NotificationRecord {
            notification: Notification {
                title: "stale".to_string(),
                body: String::new(),
                icon: String::new(),
                tag: tag.to_string(),
                actions: Vec::new(),
            },
            trigger: None,
        });
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.notification.tag != notification.tag || r.is_pending());
        records.push(NotificationRecord {
            notification: notification.clone(),
            trigger: None,
        });
        Ok(())
    }

    async fn schedule(
        &self,
        notification: &Notification,
        at: NaiveDateTime,
    ) -> std::result::Result<(), ScheduleError> {
        if !self.triggers_supported.load(Ordering::SeqCst) {
            return Err(ScheduleError::Unsupported);
        }
        self.records.lock().unwrap().push(NotificationRecord {
            notification: notification.clone(),
            trigger: Some(at),
        });
        self.history
            .lock()
            .unwrap()
            .push((notification.clone(), at));
        Ok(())
    }

    async fn notifications(&self, tag: &str) -> Result<Vec<NotificationRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.notification.tag == tag)
            .cloned()
            .collect())
    }

    async fn close(&self, tag: &str) -> Result<usize> {
        self.closed.lock().unwrap().push(tag.to_string());
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.notification.tag != tag);
        Ok(before - records.len())
    }

    async fn dismiss(&self, tag: &str) -> Result<usize> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.notification.tag != tag || r.is_pending());
        Ok(before - records.len())
    }
}

/// Window clients recording posted messages and focus changes
#[derive(Default)]
pub struct FakeClients {
    windows: Mutex<Vec<WindowClient>>,
    messages: Mutex<Vec<(String, ClientMessage)>>,
    focused: Mutex<Vec<String>>,
}

impl FakeClients {
    pub fn add_window(&self, url: &str) {
        let mut windows = self.windows.lock().unwrap();
        let id = format!("window-{}", windows.len());
        windows.push(WindowClient {
            id,
            url: url.to_string(),
        });
    }

    /// (client id, message) pairs in posting order
    pub fn messages(&self) -> Vec<(String, ClientMessage)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientHub for FakeClients {
    async fn windows(&self) -> Result<Vec<WindowClient>> {
        Ok(self.windows.lock().unwrap().clone())
    }

    async fn post_message(&self, client: &WindowClient, message: &ClientMessage) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((client.id.clone(), message.clone()));
        Ok(())
    }

    async fn focus(&self, client: &WindowClient) -> Result<()> {
        self.focused.lock().unwrap().push(client.id.clone());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<WindowClient> {
        self.add_window(url);
        Ok(self
            .windows
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("window just added"))
    }
}

/// Clock frozen at a settable instant
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

/// A worker wired to fakes, with handles on every fake
pub struct Harness {
    pub worker: Worker,
    pub caches: Arc<MemoryCacheStore>,
    pub network: Arc<FakeNetwork>,
    pub notifier: Arc<FakeNotifier>,
    pub clients: Arc<FakeClients>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Default config, manifest `["/", "/index.html"]`, clock at 09:00
    pub fn new() -> Self {
        Self::build(WorkerConfig::default(), vec!["/index.html".to_string()])
    }

    pub fn with_config(f: impl FnOnce(&mut WorkerConfig)) -> Self {
        let mut config = WorkerConfig::default();
        f(&mut config);
        Self::build(config, vec!["/index.html".to_string()])
    }

    pub fn with_manifest(files: Vec<String>) -> Self {
        Self::build(WorkerConfig::default(), files)
    }

    fn build(config: WorkerConfig, files: Vec<String>) -> Self {
        let caches = Arc::new(MemoryCacheStore::new());
        let network = Arc::new(FakeNetwork::default());
        let notifier = Arc::new(FakeNotifier::default());
        let clients = Arc::new(FakeClients::default());
        let clock = Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        ));

        let backends = Backends {
            caches: caches.clone(),
            network: network.clone(),
            notifier: notifier.clone(),
            clients: clients.clone(),
            clock: clock.clone(),
        };
        let worker = Worker::new(Arc::new(config), Arc::new(Manifest::new(files)), backends);

        Self {
            worker,
            caches,
            network,
            notifier,
            clients,
            clock,
        }
    }

    /// Move the clock
    pub fn at(self, now: NaiveDateTime) -> Self {
        self.clock.set(now);
        self
    }

    /// Make trigger scheduling fail as on hosts without trigger support
    pub fn without_triggers(self) -> Self {
        self.notifier
            .triggers_supported
            .store(false, Ordering::SeqCst);
        self
    }

    /// Open `count` windows on the app root
    pub fn with_windows(self, count: usize) -> Self {
        for _ in 0..count {
            self.clients.add_window("/");
        }
        self
    }

    pub fn router(&self) -> &Router {
        self.worker.router()
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.worker.scheduler()
    }

    pub async fn set_snooze_count(&self, count: u32) {
        self.caches
            .put(
                &self.worker.config().cache.runtime,
                SNOOZE_KEY,
                &Response::text(count.to_string()),
            )
            .await
            .unwrap();
    }

    /// Raw counter entry, `None` when absent
    pub async fn snooze_count(&self) -> Option<u32> {
        self.caches
            .get(&self.worker.config().cache.runtime, SNOOZE_KEY)
            .await
            .unwrap()
            .map(|r| r.body_text().parse().unwrap())
    }
}
