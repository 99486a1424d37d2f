//! Daily reminder scheduling and the bounded snooze counter
//!
//! States: idle, scheduled (a trigger is pending under the reminder tag) and
//! snoozed (a secondary trigger is pending, counter > 0). The counter lives in
//! the runtime namespace as a decimal string under [`SNOOZE_KEY`].

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::backend::{CacheStore, ClientHub, Clock, Notifier};
use super::types::{ClientMessage, Notification, NotificationAction, Response, WindowClient};
use super::{Backends, TaskSet};
use crate::config::{ReminderConfig, WorkerConfig};
use crate::error::{ConfigError, Result};
use crate::manifest::request_path;

/// Reserved runtime-cache key holding the snooze count
pub const SNOOZE_KEY: &str = "/__pulsemind/snooze-count";

/// How a reminder got scheduled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReminderPlan {
    /// OS-level trigger at a local wall-clock instant
    Triggered { at: NaiveDateTime },
    /// Degraded path: one-shot display after a delay, no trigger
    Delayed {
        #[serde(rename = "after_secs", serialize_with = "as_secs")]
        after: Duration,
    },
    /// A trigger under the same tag was already pending
    AlreadyScheduled,
}

fn as_secs<S: serde::Serializer>(
    after: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(after.as_secs())
}

/// Result of a snooze request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SnoozeOutcome {
    Snoozed { count: u32, plan: ReminderPlan },
    /// Ceiling reached, nothing scheduled
    LimitReached { count: u32 },
}

/// Next local occurrence of `at`.
///
/// Today when `now` is still before the target, otherwise the same time on
/// the following calendar day. Seconds and sub-seconds come from `at`.
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if now < today {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Configured reminder time with seconds zeroed
pub fn reminder_time(reminder: &ReminderConfig) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(reminder.hour, reminder.minute, 0).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "reminder time {:02}:{:02} is not a valid time of day",
            reminder.hour, reminder.minute
        ))
        .into()
    })
}

pub struct Scheduler {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStore>,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn ClientHub>,
    clock: Arc<dyn Clock>,
    /// Event lifetime extension, also holding the fallback display timers
    lifetime: TaskSet,
    /// Serializes the counter read-modify-write
    snooze_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(config: Arc<WorkerConfig>, backends: Backends, lifetime: TaskSet) -> Self {
        Self {
            config,
            caches: backends.caches,
            notifier: backends.notifier,
            clients: backends.clients,
            clock: backends.clock,
            lifetime,
            snooze_lock: Mutex::new(()),
        }
    }

    fn reminder(&self) -> &ReminderConfig {
        &self.config.reminder
    }

    fn notification(&self, tag: &str) -> Notification {
        let reminder = self.reminder();
        Notification {
            title: reminder.title.clone(),
            body: reminder.body.clone(),
            icon: reminder.icon.clone(),
            tag: tag.to_string(),
            actions: vec![
                NotificationAction {
                    action: "open".to_string(),
                    title: "Open PulseMind".to_string(),
                },
                NotificationAction {
                    action: "snooze".to_string(),
                    title: format!("Snooze {} min", reminder.snooze_minutes),
                },
            ],
        }
    }

    /// When the next daily reminder is due, from the current wall clock
    pub fn next_reminder(&self) -> Result<NaiveDateTime> {
        Ok(next_occurrence(self.clock.now(), reminder_time(self.reminder())?))
    }

    /// Clear same-tag notifications and schedule the next daily reminder
    pub async fn on_activate(&self) -> Result<ReminderPlan> {
        let cleared = self.notifier.close(&self.reminder().tag).await?;
        if cleared > 0 {
            log::debug!("Cleared {} pending reminders", cleared);
        }
        self.schedule_daily().await
    }

    /// Schedule the next daily reminder unless one is already pending
    pub async fn schedule_daily(&self) -> Result<ReminderPlan> {
        let tag = self.reminder().tag.clone();
        let at = self.next_reminder()?;
        self.schedule(self.notification(&tag), at, self.fallback_delay())
            .await
    }

    fn fallback_delay(&self) -> Duration {
        Duration::from_secs(self.reminder().fallback_delay_secs)
    }

    async fn schedule(
        &self,
        notification: Notification,
        at: NaiveDateTime,
        fallback: Duration,
    ) -> Result<ReminderPlan> {
        let existing = self.notifier.notifications(&notification.tag).await?;
        if existing.iter().any(|record| record.is_pending()) {
            log::debug!("Reminder '{}' already scheduled", notification.tag);
            return Ok(ReminderPlan::AlreadyScheduled);
        }
        self.deliver(notification, at, fallback).await
    }

    /// Schedule a trigger, or fall back to a one-shot display after `fallback`
    async fn deliver(
        &self,
        notification: Notification,
        at: NaiveDateTime,
        fallback: Duration,
    ) -> Result<ReminderPlan> {
        match self.notifier.schedule(&notification, at).await {
            Ok(()) => {
                log::info!("Reminder '{}' scheduled for {}", notification.tag, at);
                Ok(ReminderPlan::Triggered { at })
            }
            Err(e) => {
                log::warn!(
                    "Trigger scheduling failed ({}), showing '{}' in {:?}",
                    e,
                    notification.tag,
                    fallback
                );
                let notifier = self.notifier.clone();
                self.lifetime.spawn(async move {
                    tokio::time::sleep(fallback).await;
                    if let Err(e) = notifier.show(&notification).await {
                        log::warn!("Delayed reminder display failed: {}", e);
                    }
                });
                Ok(ReminderPlan::Delayed { after: fallback })
            }
        }
    }

    /// Display today's reminder and schedule tomorrow's
    pub async fn reminder_due(&self) -> Result<ReminderPlan> {
        let tag = self.reminder().tag.clone();
        self.notifier.show(&self.notification(&tag)).await?;
        self.schedule_daily().await
    }

    /// Close what is on screen for `tag`; pending triggers survive
    pub async fn dismiss(&self, tag: &str) -> Result<usize> {
        self.notifier.dismiss(tag).await
    }

    /// Current snooze count, zero when absent
    pub async fn snooze_count(&self) -> Result<u32> {
        let stored = self.caches.get(&self.config.cache.runtime, SNOOZE_KEY).await?;
        Ok(match stored {
            Some(response) => {
                let text = response.body_text();
                text.trim().parse().unwrap_or_else(|_| {
                    log::warn!("Ignoring malformed snooze count '{}'", text);
                    0
                })
            }
            None => 0,
        })
    }

    /// Push the reminder back, up to the configured ceiling
    pub async fn snooze(&self) -> Result<SnoozeOutcome> {
        let _guard = self.snooze_lock.lock().await;

        let count = self.snooze_count().await?;
        let max = self.reminder().max_snooze;
        if count >= max {
            log::info!("Snooze limit of {} reached, dropping request", max);
            return Ok(SnoozeOutcome::LimitReached { count });
        }

        let delay = Duration::from_secs(u64::from(self.reminder().snooze_minutes) * 60);
        let at = self.clock.now() + chrono::Duration::minutes(i64::from(self.reminder().snooze_minutes));
        // Every snooze gets its own secondary notification, even while an
        // earlier one is still pending
        let notification = self.notification(&self.reminder().snooze_tag());
        let plan = self.deliver(notification, at, delay).await?;

        let count = count + 1;
        self.caches
            .put(
                &self.config.cache.runtime,
                SNOOZE_KEY,
                &Response::text(count.to_string()),
            )
            .await?;
        log::info!("Snoozed ({}/{})", count, max);

        Ok(SnoozeOutcome::Snoozed { count, plan })
    }

    /// Delete the snooze counter
    pub async fn reset_snooze(&self) -> Result<()> {
        let _guard = self.snooze_lock.lock().await;
        self.caches
            .remove(&self.config.cache.runtime, SNOOZE_KEY)
            .await?;
        Ok(())
    }

    /// Daily/visibility sync: reset the counter, refresh every client and
    /// optionally show the reminder again
    pub async fn daily_reset(&self) -> Result<(usize, bool)> {
        self.reset_snooze().await?;
        let notified = self.broadcast_chart_update().await?;

        let redisplay = self.reminder().redisplay_on_sync;
        if redisplay {
            let tag = self.reminder().tag.clone();
            self.notifier.show(&self.notification(&tag)).await?;
        }

        Ok((notified, redisplay))
    }

    /// Post a chart refresh to every open window
    pub async fn broadcast_chart_update(&self) -> Result<usize> {
        let message = ClientMessage::chart_refresh();
        let windows = self.clients.windows().await?;
        for client in &windows {
            self.clients.post_message(client, &message).await?;
        }
        log::debug!("Chart refresh posted to {} clients", windows.len());
        Ok(windows.len())
    }

    /// Take control of every open window, returning how many
    pub async fn claim_clients(&self) -> Result<usize> {
        Ok(self.clients.windows().await?.len())
    }

    /// Focus a window on the app root, or open one
    pub async fn open_app(&self) -> Result<(WindowClient, bool)> {
        let windows = self.clients.windows().await?;
        if let Some(client) = windows.into_iter().find(|c| request_path(&c.url) == "/") {
            self.clients.focus(&client).await?;
            return Ok((client, true));
        }
        let client = self.clients.open_window("/").await?;
        Ok((client, false))
    }
}
