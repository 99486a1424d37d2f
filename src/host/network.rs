//! HTTP network backend

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, Url};
use std::time::Duration;

use crate::error::NetworkError;
use crate::worker::Network;
use crate::worker::types::{Request, Response};

/// Network backend resolving bare paths against an origin
pub struct HttpNetwork {
    http: HttpClient,
    origin: Url,
}

impl HttpNetwork {
    pub fn new(origin: &str) -> Result<Self, NetworkError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NetworkError::Unreachable(e.to_string()))?;
        let origin = Url::parse(origin).map_err(|_| NetworkError::InvalidUrl(origin.to_string()))?;

        Ok(Self { http, origin })
    }

    /// Absolute URL for a request target
    pub fn resolve(&self, target: &str) -> Result<Url, NetworkError> {
        self.origin
            .join(target)
            .map_err(|_| NetworkError::InvalidUrl(target.to_string()))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let url = self.resolve(&request.url)?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetworkError::InvalidUrl(format!("{} {}", request.method, request.url)))?;

        log::debug!("{} {}", method, url);
        let response = self.http.request(method, url).send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}
