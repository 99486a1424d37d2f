//! Terminal notification backend
//!
//! Notifications are printed to stderr. OS-level triggers are emulated with
//! in-process timers only when enabled; otherwise scheduling reports
//! `Unsupported` and the worker takes its delayed-display path.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use colored::Colorize;
use std::sync::{Arc, Mutex};

use crate::error::{Result, ScheduleError};
use crate::worker::types::{Notification, NotificationRecord};
use crate::worker::{Clock, Notifier, TaskSet};

type Records = Arc<Mutex<Vec<NotificationRecord>>>;

pub struct TerminalNotifier {
    records: Records,
    clock: Arc<dyn Clock>,
    triggers: Option<TaskSet>,
}

impl TerminalNotifier {
    /// Notifier without trigger support
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            clock,
            triggers: None,
        }
    }

    /// Emulate triggers with timers tracked in `tasks`
    pub fn with_triggers(mut self, tasks: TaskSet) -> Self {
        self.triggers = Some(tasks);
        self
    }

    fn print(notification: &Notification) {
        let actions: Vec<&str> = notification
            .actions
            .iter()
            .map(|a| a.action.as_str())
            .collect();
        eprintln!(
            "{} {}: {} {}",
            "[notification]".yellow().bold(),
            notification.title.bold(),
            notification.body,
            format!("(tag: {}, actions: {})", notification.tag, actions.join(", ")).dimmed()
        );
    }

    fn display(records: &Records, notification: &Notification) {
        if let Ok(mut records) = records.lock() {
            records.retain(|r| r.notification.tag != notification.tag || r.is_pending());
            records.push(NotificationRecord {
                notification: notification.clone(),
                trigger: None,
            });
        }
        Self::print(notification);
    }
}

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        Self::display(&self.records, notification);
        Ok(())
    }

    async fn schedule(
        &self,
        notification: &Notification,
        at: NaiveDateTime,
    ) -> std::result::Result<(), ScheduleError> {
        let tasks = self.triggers.as_ref().ok_or(ScheduleError::Unsupported)?;

        let delay = (at - self.clock.now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        self.records
            .lock()
            .map_err(|_| ScheduleError::Failed("notification state poisoned".to_string()))?
            .push(NotificationRecord {
                notification: notification.clone(),
                trigger: Some(at),
            });

        let records = self.records.clone();
        let notification = notification.clone();
        tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            let still_pending = records
                .lock()
                .map(|mut records| {
                    let before = records.len();
                    records.retain(|r| {
                        !(r.notification.tag == notification.tag && r.trigger == Some(at))
                    });
                    records.len() < before
                })
                .unwrap_or(false);
            // A close() in the meantime cancels the trigger
            if still_pending {
                Self::display(&records, &notification);
            }
        });

        Ok(())
    }

    async fn notifications(&self, tag: &str) -> Result<Vec<NotificationRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| crate::error::Error::Other("notification state poisoned".to_string()))?;
        Ok(records
            .iter()
            .filter(|r| r.notification.tag == tag)
            .cloned()
            .collect())
    }

    async fn close(&self, tag: &str) -> Result<usize> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| crate::error::Error::Other("notification state poisoned".to_string()))?;
        let before = records.len();
        records.retain(|r| r.notification.tag != tag);
        Ok(before - records.len())
    }

    async fn dismiss(&self, tag: &str) -> Result<usize> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| crate::error::Error::Other("notification state poisoned".to_string()))?;
        let before = records.len();
        records.retain(|r| r.notification.tag != tag || r.is_pending());
        Ok(before - records.len())
    }
}
