//! Window clients of the CLI host
//!
//! Windows are declared on the command line; messages posted to them are
//! printed as JSON lines so scripts can follow the broadcast traffic.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::worker::ClientHub;
use crate::worker::types::{ClientMessage, WindowClient};

#[derive(Default)]
pub struct StdoutClients {
    windows: Mutex<Vec<WindowClient>>,
}

impl StdoutClients {
    pub fn new<I: IntoIterator<Item = String>>(urls: I) -> Self {
        let windows = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| WindowClient {
                id: format!("window-{}", i),
                url,
            })
            .collect();
        Self {
            windows: Mutex::new(windows),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<WindowClient>>> {
        self.windows
            .lock()
            .map_err(|_| Error::Other("client state poisoned".to_string()))
    }
}

#[async_trait]
impl ClientHub for StdoutClients {
    async fn windows(&self) -> Result<Vec<WindowClient>> {
        Ok(self.lock()?.clone())
    }

    async fn post_message(&self, client: &WindowClient, message: &ClientMessage) -> Result<()> {
        let payload = serde_json::json!({
            "client": client.id,
            "message": message,
        });
        println!("{}", serde_json::to_string(&payload)?);
        Ok(())
    }

    async fn focus(&self, client: &WindowClient) -> Result<()> {
        log::info!("Focusing {} ({})", client.id, client.url);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<WindowClient> {
        let mut windows = self.lock()?;
        let client = WindowClient {
            id: format!("window-{}", windows.len()),
            url: url.to_string(),
        };
        windows.push(client.clone());
        log::info!("Opened {} at {}", client.id, url);
        Ok(client)
    }
}
