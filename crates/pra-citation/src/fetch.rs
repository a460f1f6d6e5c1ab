//! Page fetching
//!
//! The verifier follows redirects itself so it can count hops, so fetchers
//! perform exactly one request per call and never follow `Location` headers.
//!
//! - [`ReqwestFetcher`]: real HTTP(S), read-only, no credentials
//! - [`StaticFetcher`]: in-memory pages for offline runs and tests

use crate::config::VerifierConfig;
use crate::error::{FetchError, TransportErrorKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::LOCATION;
use std::collections::HashMap;
use std::error::Error as _;
use std::fmt;
use url::Url;

/// HTTP method used for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMethod {
    /// Existence check
    Head,
    /// Full document
    Get,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => f.write_str("HEAD"),
            Self::Get => f.write_str("GET"),
        }
    }
}

/// A single HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Status code
    pub status: u16,
    /// Raw `Location` header, if any
    pub location: Option<String>,
    /// Decoded body; `None` for HEAD
    pub body: Option<String>,
}

impl FetchResponse {
    /// Check if status is a redirect
    #[inline]
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }
}

/// Issues one outbound request without following redirects
#[async_trait]
pub trait PageFetcher: Send + Sync + fmt::Debug {
    /// Perform a single request
    async fn fetch(&self, method: FetchMethod, url: &Url) -> Result<FetchResponse, FetchError>;
}

/// HTTP fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestFetcher {
    /// Build a client from verifier settings
    pub fn new(config: &VerifierConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn read_body(
        &self,
        mut response: reqwest::Response,
    ) -> Result<String, FetchError> {
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            let room = self.max_body_bytes.saturating_sub(bytes.len());
            if chunk.len() >= room {
                bytes.extend_from_slice(&chunk[..room]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, method: FetchMethod, url: &Url) -> Result<FetchResponse, FetchError> {
        let http_method = match method {
            FetchMethod::Head => reqwest::Method::HEAD,
            FetchMethod::Get => reqwest::Method::GET,
        };

        let response = self
            .client
            .request(http_method, url.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = match method {
            FetchMethod::Head => None,
            FetchMethod::Get => Some(self.read_body(response).await?),
        };

        Ok(FetchResponse {
            status,
            location,
            body,
        })
    }
}

/// Map a reqwest error onto a transport category
fn classify(err: reqwest::Error) -> FetchError {
    let mut chain = err.to_string().to_lowercase();
    let mut source = err.source();
    while let Some(inner) = source {
        chain.push_str(" | ");
        chain.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }

    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if chain.contains("dns error") || chain.contains("failed to lookup address") {
        TransportErrorKind::Dns
    } else if chain.contains("connection refused") {
        TransportErrorKind::ConnectionRefused
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        TransportErrorKind::Tls
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    };

    FetchError::transport(kind, chain)
}

#[derive(Debug, Clone)]
struct StaticRoute {
    status: u16,
    head_status: Option<u16>,
    location: Option<String>,
    body: String,
    failure: Option<TransportErrorKind>,
    failures_remaining: usize,
}

impl StaticRoute {
    fn page(status: u16, body: String) -> Self {
        Self {
            status,
            head_status: None,
            location: None,
            body,
            failure: None,
            failures_remaining: 0,
        }
    }
}

/// In-memory fetcher
///
/// Unknown URLs answer 404. Every call is counted, which makes cache
/// behaviour observable.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: Mutex<HashMap<String, StaticRoute>>,
    calls: Mutex<Vec<(FetchMethod, String)>>,
}

impl StaticFetcher {
    /// Create empty fetcher
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(url: &str) -> String {
        Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string())
    }

    fn insert(self, url: &str, route: StaticRoute) -> Self {
        self.routes.lock().insert(Self::key(url), route);
        self
    }

    /// Serve a 200 page
    #[must_use]
    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        self.insert(url, StaticRoute::page(200, html.into()))
    }

    /// Serve a bare status code
    #[must_use]
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.insert(url, StaticRoute::page(status, String::new()))
    }

    /// Serve a 301 redirect
    #[must_use]
    pub fn with_redirect(self, url: &str, location: impl Into<String>) -> Self {
        let mut route = StaticRoute::page(301, String::new());
        route.location = Some(location.into());
        self.insert(url, route)
    }

    /// Answer HEAD with 405 and serve the page on GET
    #[must_use]
    pub fn with_head_rejected(self, url: &str, html: impl Into<String>) -> Self {
        let mut route = StaticRoute::page(200, html.into());
        route.head_status = Some(405);
        self.insert(url, route)
    }

    /// Fail every request with a transport error
    #[must_use]
    pub fn with_failure(self, url: &str, kind: TransportErrorKind) -> Self {
        let mut route = StaticRoute::page(0, String::new());
        route.failure = Some(kind);
        route.failures_remaining = usize::MAX;
        self.insert(url, route)
    }

    /// Fail the first `failures` requests, then serve the page
    #[must_use]
    pub fn with_flaky_page(
        self,
        url: &str,
        kind: TransportErrorKind,
        failures: usize,
        html: impl Into<String>,
    ) -> Self {
        let mut route = StaticRoute::page(200, html.into());
        route.failure = Some(kind);
        route.failures_remaining = failures;
        self.insert(url, route)
    }

    /// Total requests served
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Requests served for one URL
    #[must_use]
    pub fn calls_for(&self, url: &str) -> usize {
        let key = Self::key(url);
        self.calls.lock().iter().filter(|(_, u)| *u == key).count()
    }

    /// Request log in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<(FetchMethod, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, method: FetchMethod, url: &Url) -> Result<FetchResponse, FetchError> {
        let key = url.to_string();
        self.calls.lock().push((method, key.clone()));

        let mut routes = self.routes.lock();
        let Some(route) = routes.get_mut(&key) else {
            return Ok(FetchResponse {
                status: 404,
                location: None,
                body: (method == FetchMethod::Get).then(String::new),
            });
        };

        if let Some(kind) = route.failure {
            if route.failures_remaining > 0 {
                route.failures_remaining = route.failures_remaining.saturating_sub(1);
                return Err(FetchError::transport(kind, format!("simulated failure for {key}")));
            }
        }

        let status = match method {
            FetchMethod::Head => route.head_status.unwrap_or(route.status),
            FetchMethod::Get => route.status,
        };
        Ok(FetchResponse {
            status,
            location: route.location.clone(),
            body: (method == FetchMethod::Get).then(|| route.body.clone()),
        })
    }
}
