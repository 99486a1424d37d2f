//! Values exchanged between the worker and its host

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Outgoing request intercepted by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            url: url.into(),
        }
    }

    /// Key under which this request is cached
    pub fn cache_key(&self) -> &str {
        &self.url
    }
}

/// Response served to the page, stored verbatim in a cache namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status, `0` for the terminal network-error response
    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(|s| s.to_string()),
            body: body.into(),
        }
    }

    /// 200 response with a text body
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200, Some("text/plain"), body.into().into_bytes())
    }

    /// Generic network-error response with no body
    pub fn network_error() -> Self {
        Self {
            status: 0,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// 2xx status
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_network_error(&self) -> bool {
        self.status == 0
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A button shown on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Notification shown (or scheduled) by the reminder scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub tag: String,
    pub actions: Vec<NotificationAction>,
}

/// Notification known to the host, either displayed or waiting on a trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub notification: Notification,
    /// Local wall-clock instant of a pending trigger, `None` once displayed
    pub trigger: Option<NaiveDateTime>,
}

impl NotificationRecord {
    pub fn is_pending(&self) -> bool {
        self.trigger.is_some()
    }
}

/// An open application window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

/// Payload of the chart refresh broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartUpdate {
    pub force_refresh: bool,
}

/// Message posted from the worker to window clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    ChartUpdate { data: ChartUpdate },
}

impl ClientMessage {
    pub fn chart_refresh() -> Self {
        ClientMessage::ChartUpdate {
            data: ChartUpdate {
                force_refresh: true,
            },
        }
    }
}

/// Message posted from a page to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    TriggerUpdate,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_update_wire_format() {
        let json = serde_json::to_value(ClientMessage::chart_refresh()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "CHART_UPDATE", "data": {"forceRefresh": true}})
        );
    }

    #[test]
    fn test_worker_message_parsing() {
        let msg: WorkerMessage = serde_json::from_str(r#"{"type":"TRIGGER_UPDATE"}"#).unwrap();
        assert_eq!(msg, WorkerMessage::TriggerUpdate);

        let msg: WorkerMessage = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(msg, WorkerMessage::Unknown);
    }

    #[test]
    fn test_network_error_response() {
        let response = Response::network_error();
        assert!(response.is_network_error());
        assert!(!response.ok());
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_request_defaults_to_get() {
        let req: Request = serde_json::from_str(r#"{"url":"/index.html"}"#).unwrap();
        assert_eq!(req, Request::get("/index.html"));
    }
}
