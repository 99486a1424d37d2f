//! Fetch routing and cache lifecycle
//!
//! Every request is classified into one policy, first match wins:
//! API (network first, runtime write-back), static (precache first) and
//! default (network first, any cache on failure).

use futures::future::{join_all, try_join_all};
use serde::{Serialize, Serializer};
use std::sync::Arc;

use super::TaskSet;
use super::backend::{CacheStore, Network};
use super::types::{Request, Response};
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Routing policy chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Api,
    Static,
    Default,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Api => "api",
            Policy::Static => "static",
            Policy::Default => "default",
        }
    }
}

/// Where the served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Network,
    Precache,
    Runtime,
    /// The fixed fallback payload
    Fallback,
    /// Any namespace, default policy only
    Cache,
    /// Terminal network-error response
    Error,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Network => "network",
            Source::Precache => "precache",
            Source::Runtime => "runtime",
            Source::Fallback => "fallback",
            Source::Cache => "cache",
            Source::Error => "error",
        }
    }
}

/// A routed response with its provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routed {
    pub policy: Policy,
    pub source: Source,
    #[serde(serialize_with = "text_response")]
    pub response: Response,
}

#[derive(Serialize)]
struct TextResponse<'a> {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    body: String,
}

/// Responses print with a text body instead of a byte array
fn text_response<S: Serializer>(
    response: &Response,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    TextResponse {
        status: response.status,
        content_type: response.content_type.as_deref(),
        body: response.body_text(),
    }
    .serialize(serializer)
}

impl Routed {
    fn new(policy: Policy, source: Source, response: Response) -> Self {
        Self {
            policy,
            source,
            response,
        }
    }

    fn error(policy: Policy) -> Self {
        Self::new(policy, Source::Error, Response::network_error())
    }
}

pub struct Router {
    config: Arc<WorkerConfig>,
    manifest: Arc<Manifest>,
    caches: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    lifetime: TaskSet,
}

impl Router {
    pub fn new(
        config: Arc<WorkerConfig>,
        manifest: Arc<Manifest>,
        caches: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        lifetime: TaskSet,
    ) -> Self {
        Self {
            config,
            manifest,
            caches,
            network,
            lifetime,
        }
    }

    pub fn caches(&self) -> &Arc<dyn CacheStore> {
        &self.caches
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Pick the policy for a request target
    pub fn classify(&self, request: &Request) -> Policy {
        if request.url.contains(self.config.routes.api_marker.as_str()) {
            Policy::Api
        } else if self.manifest.matches(&request.url) {
            Policy::Static
        } else {
            Policy::Default
        }
    }

    /// Serve a request. Never fails: every miss degrades to the terminal
    /// network-error response.
    pub async fn route(&self, request: &Request) -> Routed {
        let policy = self.classify(request);
        log::debug!("{} {} -> {} policy", request.method, request.url, policy.as_str());

        match policy {
            Policy::Api => self.api(request).await,
            Policy::Static => self.static_asset(request).await,
            Policy::Default => self.default(request).await,
        }
    }

    async fn api(&self, request: &Request) -> Routed {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    self.write_back(request, response.clone());
                }
                Routed::new(Policy::Api, Source::Network, response)
            }
            Err(e) => {
                log::debug!("API fetch failed for {}: {}", request.url, e);
                let runtime = self.config.cache.runtime.as_str();

                if let Some(cached) = self.lookup(runtime, request.cache_key()).await {
                    return Routed::new(Policy::Api, Source::Runtime, cached);
                }

                let fallback = self.config.routes.fallback_url.as_str();
                match self.caches.match_any(&self.config.cache.current(), fallback).await {
                    Ok(Some(payload)) => Routed::new(Policy::Api, Source::Fallback, payload),
                    Ok(None) => Routed::error(Policy::Api),
                    Err(e) => {
                        log::warn!("Fallback lookup failed: {}", e);
                        Routed::error(Policy::Api)
                    }
                }
            }
        }
    }

    async fn static_asset(&self, request: &Request) -> Routed {
        let precache = self.config.cache.version.as_str();
        if let Some(cached) = self.lookup(precache, request.cache_key()).await {
            return Routed::new(Policy::Static, Source::Precache, cached);
        }

        match self.network.fetch(request).await {
            Ok(response) => Routed::new(Policy::Static, Source::Network, response),
            Err(e) => {
                log::debug!("Static fetch failed for {}: {}", request.url, e);
                Routed::error(Policy::Static)
            }
        }
    }

    async fn default(&self, request: &Request) -> Routed {
        match self.network.fetch(request).await {
            Ok(response) => Routed::new(Policy::Default, Source::Network, response),
            Err(e) => {
                log::debug!("Fetch failed for {}: {}", request.url, e);
                match self
                    .caches
                    .match_any(&self.config.cache.current(), request.cache_key())
                    .await
                {
                    Ok(Some(cached)) => Routed::new(Policy::Default, Source::Cache, cached),
                    Ok(None) => Routed::error(Policy::Default),
                    Err(e) => {
                        log::warn!("Cache lookup failed: {}", e);
                        Routed::error(Policy::Default)
                    }
                }
            }
        }
    }

    async fn lookup(&self, namespace: &str, key: &str) -> Option<Response> {
        match self.caches.get(namespace, key).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Cache read from {} failed: {}", namespace, e);
                None
            }
        }
    }

    /// Store a duplicate in the runtime namespace without delaying the caller
    fn write_back(&self, request: &Request, response: Response) {
        let caches = self.caches.clone();
        let namespace = self.config.cache.runtime.clone();
        let key = request.cache_key().to_string();

        self.lifetime.spawn(async move {
            if let Err(e) = caches.put(&namespace, &key, &response).await {
                log::warn!("Runtime cache write for {} failed: {}", key, e);
            }
        });
    }

    /// Fetch the whole manifest into the precache namespace.
    ///
    /// All-or-nothing: a single failed or non-2xx fetch, or a failed write,
    /// leaves the namespace as it was.
    pub async fn precache(&self) -> Result<usize> {
        let requests: Vec<Request> = self
            .manifest
            .urls()
            .iter()
            .map(|url| Request::get(url.clone()))
            .collect();

        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = self
                .network
                .fetch(request)
                .await
                .map_err(|e| Error::Install(format!("{}: {}", request.url, e)))?;
            if !response.ok() {
                return Err(Error::Install(format!(
                    "{} returned status {}",
                    request.url, response.status
                )));
            }
            Ok(response)
        }))
        .await?;

        let namespace = self.config.cache.version.as_str();
        let existed = self
            .caches
            .namespaces()
            .await?
            .iter()
            .any(|name| name == namespace);

        // Snapshot what the writes below may overwrite
        let mut previous: Vec<(&str, Option<Response>)> = Vec::new();
        if existed {
            for request in &requests {
                let key = request.cache_key();
                previous.push((key, self.caches.get(namespace, key).await?));
            }
        }

        for (request, response) in requests.iter().zip(responses.iter()) {
            if let Err(e) = self.caches.put(namespace, request.cache_key(), response).await {
                self.roll_back(namespace, existed, previous).await;
                return Err(Error::Install(format!("{}: {}", request.url, e)));
            }
        }

        Ok(requests.len())
    }

    /// Undo a partial precache write
    async fn roll_back(
        &self,
        namespace: &str,
        existed: bool,
        previous: Vec<(&str, Option<Response>)>,
    ) {
        if !existed {
            if let Err(e) = self.caches.delete_namespace(namespace).await {
                log::warn!("Could not remove partial precache {}: {}", namespace, e);
            }
            return;
        }
        for (key, prior) in previous {
            let restored = match prior {
                Some(response) => self.caches.put(namespace, key, &response).await,
                None => self.caches.remove(namespace, key).await.map(|_| ()),
            };
            if let Err(e) = restored {
                log::warn!("Could not restore precache entry {}: {}", key, e);
            }
        }
    }

    /// Delete every namespace that is not one of the two current names
    pub async fn purge_stale_caches(&self) -> Result<Vec<String>> {
        let current = self.config.cache.current();
        let stale: Vec<String> = self
            .caches
            .namespaces()
            .await?
            .into_iter()
            .filter(|name| !current.contains(&name.as_str()))
            .collect();

        let results = join_all(stale.iter().map(|name| self.caches.delete_namespace(name))).await;
        for (name, result) in stale.iter().zip(results) {
            match result {
                Ok(_) => log::info!("Deleted stale cache {}", name),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::mock::{FakeNetwork, FlakyCacheStore, Harness};

    const RUNTIME: &str = "runtime-pulsemind";
    const PRECACHE: &str = "pulsemind-v1.1.0";

    #[tokio::test]
    async fn test_api_success_writes_back_to_runtime() {
        let harness = Harness::new();
        harness
            .network
            .respond("/api/readings", Response::text(r#"{"gsr":3.2}"#));

        let routed = harness.router().route(&Request::get("/api/readings")).await;
        assert_eq!(routed.policy, Policy::Api);
        assert_eq!(routed.source, Source::Network);

        harness.worker.settle().await;
        let stored = harness.caches.get(RUNTIME, "/api/readings").await.unwrap();
        assert_eq!(stored, Some(Response::text(r#"{"gsr":3.2}"#)));
    }

    #[tokio::test]
    async fn test_api_non_ok_is_returned_but_not_cached() {
        let harness = Harness::new();
        harness
            .network
            .respond("/api/readings", Response::new(503, None, Vec::new()));

        let routed = harness.router().route(&Request::get("/api/readings")).await;
        assert_eq!(routed.response.status, 503);

        harness.worker.settle().await;
        assert!(harness.caches.get(RUNTIME, "/api/readings").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_failure_serves_runtime_entry_verbatim() {
        let harness = Harness::new();
        let cached = Response::new(200, Some("application/json"), br#"{"gsr":1.0}"#.to_vec());
        harness.caches.put(RUNTIME, "/api/readings", &cached).await.unwrap();

        let routed = harness.router().route(&Request::get("/api/readings")).await;
        assert_eq!(routed.source, Source::Runtime);
        assert_eq!(routed.response, cached);
    }

    #[tokio::test]
    async fn test_api_failure_without_entry_serves_fallback() {
        let harness = Harness::new();
        let fallback = Response::text(r#"{"offline":true}"#);
        harness
            .caches
            .put(PRECACHE, "/pulsemind/assets/fallback-data.json", &fallback)
            .await
            .unwrap();

        let routed = harness.router().route(&Request::get("/api/readings")).await;
        assert_eq!(routed.source, Source::Fallback);
        assert_eq!(routed.response, fallback);
    }

    #[tokio::test]
    async fn test_api_failure_with_nothing_cached_is_terminal_error() {
        let harness = Harness::new();

        let routed = harness.router().route(&Request::get("/api/readings")).await;
        assert_eq!(routed.source, Source::Error);
        assert!(routed.response.is_network_error());
    }

    #[tokio::test]
    async fn test_static_served_from_precache_without_network() {
        let harness = Harness::new();
        harness
            .caches
            .put(PRECACHE, "/index.html", &Response::text("<html>"))
            .await
            .unwrap();

        for _ in 0..3 {
            let routed = harness.router().route(&Request::get("/index.html")).await;
            assert_eq!(routed.policy, Policy::Static);
            assert_eq!(routed.source, Source::Precache);
        }
        assert_eq!(harness.network.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_miss_goes_to_network_without_write_back() {
        let harness = Harness::new();
        harness.network.respond("/index.html", Response::text("fresh"));

        let routed = harness.router().route(&Request::get("/index.html")).await;
        assert_eq!(routed.source, Source::Network);

        harness.worker.settle().await;
        assert!(harness.caches.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_falls_back_to_any_cache() {
        let harness = Harness::new();
        harness
            .caches
            .put(RUNTIME, "/reports/today", &Response::text("old report"))
            .await
            .unwrap();

        let routed = harness.router().route(&Request::get("/reports/today")).await;
        assert_eq!(routed.policy, Policy::Default);
        assert_eq!(routed.source, Source::Cache);
        assert_eq!(routed.response.body_text(), "old report");
    }

    #[tokio::test]
    async fn test_default_miss_is_terminal_error() {
        let harness = Harness::new();

        let routed = harness.router().route(&Request::get("/reports/today")).await;
        assert_eq!(routed.source, Source::Error);
        assert_eq!(routed.response, Response::network_error());
    }

    #[tokio::test]
    async fn test_api_marker_wins_over_manifest() {
        let harness = Harness::with_manifest(vec!["/api/static.json".to_string()]);
        assert_eq!(
            harness.router().classify(&Request::get("/api/static.json")),
            Policy::Api
        );
    }

    #[tokio::test]
    async fn test_precache_is_all_or_nothing() {
        let harness = Harness::new();
        harness.network.respond("/", Response::text("home"));
        // "/index.html" has no scripted response and fails

        let err = harness.router().precache().await.unwrap_err();
        assert!(err.to_string().contains("/index.html"));
        assert!(harness.caches.namespaces().await.unwrap().is_empty());
    }

    fn flaky_router(fail_on: usize) -> (Router, Arc<FlakyCacheStore>) {
        let caches = Arc::new(FlakyCacheStore::failing_on_put(fail_on));
        let network = Arc::new(FakeNetwork::default());
        network.respond("/", Response::text("home"));
        network.respond("/index.html", Response::text("index"));
        let router = Router::new(
            Arc::new(WorkerConfig::default()),
            Arc::new(Manifest::new(vec!["/index.html".to_string()])),
            caches.clone(),
            network,
            TaskSet::new(),
        );
        (router, caches)
    }

    #[tokio::test]
    async fn test_precache_write_failure_drops_new_namespace() {
        let (router, caches) = flaky_router(2);

        let err = router.precache().await.unwrap_err();

        assert!(err.to_string().contains("/index.html"));
        assert!(caches.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_precache_write_failure_restores_existing_entries() {
        let (router, caches) = flaky_router(3);
        caches
            .put(PRECACHE, "/", &Response::text("old home"))
            .await
            .unwrap();

        router.precache().await.unwrap_err();

        let home = caches.get(PRECACHE, "/").await.unwrap().unwrap();
        assert_eq!(home.body_text(), "old home");
        assert!(caches.get(PRECACHE, "/index.html").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_precache_rejects_non_ok() {
        let harness = Harness::new();
        harness.network.respond("/", Response::text("home"));
        harness
            .network
            .respond("/index.html", Response::new(404, None, Vec::new()));

        let err = harness.router().precache().await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_activation_purges_only_stale_namespaces() {
        let harness = Harness::new();
        for name in ["old-v1", PRECACHE, RUNTIME] {
            harness
                .caches
                .put(name, "/index.html", &Response::text(name))
                .await
                .unwrap();
        }

        let purged = harness.router().purge_stale_caches().await.unwrap();
        assert_eq!(purged, vec!["old-v1".to_string()]);

        let mut remaining = harness.caches.namespaces().await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec![PRECACHE.to_string(), RUNTIME.to_string()]);
    }
}
