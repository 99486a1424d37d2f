//! Background sync of cached API requests

use super::backend::{CacheStore, Network};
use super::types::Request;
use crate::config::WorkerConfig;
use crate::error::{Error, Result};

/// Re-send every cached API request, dropping each entry once the network
/// accepts it.
///
/// The first failure aborts the batch and is returned, so the host can retry
/// the whole sync later.
pub async fn replay_api_entries(
    config: &WorkerConfig,
    caches: &dyn CacheStore,
    network: &dyn Network,
) -> Result<usize> {
    let runtime = config.cache.runtime.as_str();
    let keys: Vec<String> = caches
        .keys(runtime)
        .await?
        .into_iter()
        .filter(|key| key.contains(config.routes.api_marker.as_str()))
        .collect();

    let mut replayed = 0;
    for key in keys {
        let request = Request::get(key.clone());
        match network.fetch(&request).await {
            Ok(response) if response.ok() => {
                caches.remove(runtime, &key).await?;
                replayed += 1;
            }
            Ok(response) => {
                log::error!("Sync failed for: {} (status {})", key, response.status);
                return Err(Error::Sync { url: key });
            }
            Err(e) => {
                log::error!("Sync failed for: {} {}", key, e);
                return Err(Error::Sync { url: key });
            }
        }
    }

    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use crate::worker::mock::Harness;
    use crate::worker::types::Response;
    use crate::worker::{CacheStore, Outcome, WorkerEvent};

    const RUNTIME: &str = "runtime-pulsemind";

    #[tokio::test]
    async fn test_sync_replays_and_drops_api_entries() {
        let harness = Harness::new();
        for key in ["/api/a", "/api/b", "/reports/today"] {
            harness
                .caches
                .put(RUNTIME, key, &Response::text("cached"))
                .await
                .unwrap();
        }
        harness.network.respond("/api/a", Response::text("ok"));
        harness.network.respond("/api/b", Response::text("ok"));

        let outcome = harness
            .worker
            .dispatch(WorkerEvent::Sync {
                tag: "sync-gsr-data".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Synced { replayed: 2 });
        let remaining = harness.caches.keys(RUNTIME).await.unwrap();
        assert_eq!(remaining, vec!["/reports/today".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_failure_fails_the_batch() {
        let harness = Harness::new();
        harness
            .caches
            .put(RUNTIME, "/api/a", &Response::text("cached"))
            .await
            .unwrap();
        harness
            .network
            .respond("/api/a", Response::new(500, None, Vec::new()));

        let err = harness
            .worker
            .dispatch(WorkerEvent::Sync {
                tag: "sync-gsr-data".to_string(),
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("/api/a"));
        assert_eq!(harness.caches.keys(RUNTIME).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_leaves_snooze_counter_alone() {
        let harness = Harness::new();
        harness.set_snooze_count(2).await;

        let outcome = harness
            .worker
            .dispatch(WorkerEvent::Sync {
                tag: "sync-gsr-data".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Synced { replayed: 0 });
        assert_eq!(harness.snooze_count().await, Some(2));
    }
}
