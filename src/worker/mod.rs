//! Service worker runtime
//!
//! A single dispatcher routes platform events to one handler per event kind.
//! Handlers only touch the host through the traits in [`backend`], so the
//! whole worker runs against fakes in tests.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub mod backend;
#[cfg(test)]
pub mod mock;
pub mod router;
pub mod scheduler;
pub mod sync;
pub mod types;

pub use backend::{CacheStore, ClientHub, Clock, Network, Notifier};
pub use router::{Policy, Routed, Router, Source};
pub use scheduler::{ReminderPlan, Scheduler, SnoozeOutcome, next_occurrence};
pub use types::{ClientMessage, Request, Response, WindowClient, WorkerMessage};

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::manifest::Manifest;

/// Sync tag replaying cached API requests
pub const SYNC_API_TAG: &str = "sync-gsr-data";
/// Sync tags resetting the snooze counter
pub const DAILY_SYNC_TAGS: [&str; 2] = ["daily-sync", "visibility-sync"];
/// Periodic tags broadcasting a chart refresh
pub const CHART_UPDATE_TAGS: [&str; 2] = ["chart-update", "update-gsr-charts"];
/// Periodic tag resetting the snooze counter only
pub const SNOOZE_RESET_TAG: &str = "snooze-reset";

/// Platform event delivered to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch {
        #[serde(flatten)]
        request: Request,
    },
    Sync {
        tag: String,
    },
    PeriodicSync {
        tag: String,
    },
    NotificationClick {
        #[serde(default)]
        action: Option<String>,
        #[serde(default)]
        tag: Option<String>,
    },
    Message {
        data: WorkerMessage,
    },
}

impl WorkerEvent {
    /// Short name used in logs and output
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch { .. } => "fetch",
            WorkerEvent::Sync { .. } => "sync",
            WorkerEvent::PeriodicSync { .. } => "periodic-sync",
            WorkerEvent::NotificationClick { .. } => "notification-click",
            WorkerEvent::Message { .. } => "message",
        }
    }
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    Installed {
        precached: usize,
        /// The new worker activates without waiting for old clients
        skip_waiting: bool,
    },
    Activated {
        purged: Vec<String>,
        reminder: ReminderPlan,
        /// Windows taken over by the activated worker
        clients_claimed: usize,
    },
    Fetched(Routed),
    Synced {
        replayed: usize,
    },
    DailyReset {
        notified_clients: usize,
        redisplayed: bool,
    },
    SnoozeReset,
    Broadcast {
        notified_clients: usize,
    },
    ReminderShown {
        next: ReminderPlan,
    },
    #[serde(rename = "snooze")]
    Snoozed(SnoozeOutcome),
    Opened {
        client: WindowClient,
        focused: bool,
    },
    Ignored {
        reason: String,
    },
}

/// Tracked background tasks.
///
/// Backs the event lifetime extension: work the host must await before
/// tearing the worker down, fallback display timers included.
#[derive(Clone, Default)]
pub struct TaskSet {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task tracked by this set
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        match self.handles.lock() {
            Ok(mut handles) => handles.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    fn take(&self) -> Vec<JoinHandle<()>> {
        match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Await every tracked task, including tasks spawned while waiting.
    /// Returns how many tasks completed.
    pub async fn settle(&self) -> usize {
        let mut completed = 0;
        loop {
            let batch = self.take();
            if batch.is_empty() {
                return completed;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    log::warn!("Background task failed: {}", e);
                }
                completed += 1;
            }
        }
    }

    /// Tasks that have not finished yet
    pub fn pending(&self) -> usize {
        match self.handles.lock() {
            Ok(handles) => handles.iter().filter(|h| !h.is_finished()).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .filter(|h| !h.is_finished())
                .count(),
        }
    }

    /// Abort everything still running, returning how many were aborted
    pub fn abort_all(&self) -> usize {
        let mut aborted = 0;
        for handle in self.take() {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        aborted
    }
}

/// Host capabilities handed to the worker at startup
#[derive(Clone)]
pub struct Backends {
    pub caches: Arc<dyn CacheStore>,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn ClientHub>,
    pub clock: Arc<dyn Clock>,
}

/// The service worker: configuration, frozen manifest and the two components
pub struct Worker {
    config: Arc<WorkerConfig>,
    router: Router,
    scheduler: Scheduler,
    lifetime: TaskSet,
}

impl Worker {
    pub fn new(config: Arc<WorkerConfig>, manifest: Arc<Manifest>, backends: Backends) -> Self {
        let lifetime = TaskSet::new();
        let router = Router::new(
            config.clone(),
            manifest,
            backends.caches.clone(),
            backends.network.clone(),
            lifetime.clone(),
        );
        let scheduler = Scheduler::new(config.clone(), backends, lifetime.clone());
        Self {
            config,
            router,
            scheduler,
            lifetime,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle one platform event
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<Outcome> {
        log::debug!("Dispatching {} event", event.kind());

        match event {
            WorkerEvent::Install => self.on_install().await,
            WorkerEvent::Activate => self.on_activate().await,
            WorkerEvent::Fetch { request } => Ok(Outcome::Fetched(self.router.route(&request).await)),
            WorkerEvent::Sync { tag } => self.on_sync(&tag).await,
            WorkerEvent::PeriodicSync { tag } => self.on_periodic_sync(&tag).await,
            WorkerEvent::NotificationClick { action, tag } => {
                self.on_notification_click(action.as_deref(), tag.as_deref())
                    .await
            }
            WorkerEvent::Message { data } => self.on_message(data).await,
        }
    }

    /// Await all work registered on the event lifetime extension
    pub async fn settle(&self) -> usize {
        self.lifetime.settle().await
    }

    /// Lifetime work that has not finished yet
    pub fn pending(&self) -> usize {
        self.lifetime.pending()
    }

    /// Drop unfinished lifetime work, as a host terminating the worker would
    pub fn terminate(&self) -> usize {
        self.lifetime.abort_all()
    }

    async fn on_install(&self) -> Result<Outcome> {
        let precached = self.router.precache().await?;
        log::info!("Pre-cached {} resources, skipping waiting", precached);
        Ok(Outcome::Installed {
            precached,
            skip_waiting: true,
        })
    }

    async fn on_activate(&self) -> Result<Outcome> {
        let purged = self.router.purge_stale_caches().await?;
        let reminder = self.scheduler.on_activate().await?;
        let clients_claimed = self.scheduler.claim_clients().await?;
        log::info!("Activated, claimed {} clients", clients_claimed);
        Ok(Outcome::Activated {
            purged,
            reminder,
            clients_claimed,
        })
    }

    async fn on_sync(&self, tag: &str) -> Result<Outcome> {
        if tag == SYNC_API_TAG {
            let replayed = sync::replay_api_entries(
                &self.config,
                self.router.caches().as_ref(),
                self.router.network().as_ref(),
            )
            .await?;
            return Ok(Outcome::Synced { replayed });
        }

        if DAILY_SYNC_TAGS.contains(&tag) {
            let (notified_clients, redisplayed) = self.scheduler.daily_reset().await?;
            return Ok(Outcome::DailyReset {
                notified_clients,
                redisplayed,
            });
        }

        log::debug!("Ignoring sync tag '{}'", tag);
        Ok(Outcome::Ignored {
            reason: format!("unknown sync tag '{}'", tag),
        })
    }

    async fn on_periodic_sync(&self, tag: &str) -> Result<Outcome> {
        if CHART_UPDATE_TAGS.contains(&tag) {
            let notified_clients = self.scheduler.broadcast_chart_update().await?;
            return Ok(Outcome::Broadcast { notified_clients });
        }

        if tag == self.config.reminder.tag {
            let next = self.scheduler.reminder_due().await?;
            return Ok(Outcome::ReminderShown { next });
        }

        if tag == SNOOZE_RESET_TAG {
            self.scheduler.reset_snooze().await?;
            return Ok(Outcome::SnoozeReset);
        }

        log::debug!("Ignoring periodic sync tag '{}'", tag);
        Ok(Outcome::Ignored {
            reason: format!("unknown periodic sync tag '{}'", tag),
        })
    }

    async fn on_notification_click(&self, action: Option<&str>, tag: Option<&str>) -> Result<Outcome> {
        let tag = tag.unwrap_or(&self.config.reminder.tag);
        self.scheduler.dismiss(tag).await?;

        match action {
            Some("snooze") => Ok(Outcome::Snoozed(self.scheduler.snooze().await?)),
            Some("open") | None => {
                let (client, focused) = self.scheduler.open_app().await?;
                Ok(Outcome::Opened { client, focused })
            }
            Some(other) => {
                log::debug!("Unknown notification action '{}', opening app", other);
                let (client, focused) = self.scheduler.open_app().await?;
                Ok(Outcome::Opened { client, focused })
            }
        }
    }

    async fn on_message(&self, message: WorkerMessage) -> Result<Outcome> {
        match message {
            WorkerMessage::TriggerUpdate => {
                let notified_clients = self.scheduler.broadcast_chart_update().await?;
                Ok(Outcome::Broadcast { notified_clients })
            }
            WorkerMessage::Unknown => Ok(Outcome::Ignored {
                reason: "unknown message type".to_string(),
            }),
        }
    }
}
