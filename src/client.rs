//! HTTP transport for timing probes
//!
//! The transport is configured so that the measured interval covers only the
//! target endpoint's own processing plus the network: redirects are never
//! followed, compression is never negotiated, and the clock stops when the
//! response headers arrive. The body is drained afterwards, outside the timed
//! window, so pooled connections can be reused.
//!
//! On the wire a probe carries `host`, `authorization`, `accept-encoding:
//! identity` and the `accept: */*` that `reqwest` adds to every request. No
//! `user-agent` is sent. Apart from the `Authorization` value both tokens'
//! requests are byte-for-byte the same.

pub mod retry;


pub use retry::RetryPolicy;

use crate::{
    error::{AppError, Result},
    logging::Logger,
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

/// Transport used by the sampler and the warm-up driver
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send over the shared, pooled connection
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse>;

    /// Send over a brand-new connection that is closed afterwards
    async fn send_fresh(&self, request: &ProbeRequest) -> Result<ProbeResponse>;
}

/// A single probe request
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl ProbeRequest {
    /// Create a new request with no headers
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// GET carrying an `Authorization` value, with compression disabled
    pub fn authorized_get(url: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
            .with_header("Authorization", authorization)
            .with_header("Accept-Encoding", "identity")
    }

    /// Add custom header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response status, headers and client-observed round trip
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub elapsed_microseconds: u64,
}

impl ProbeResponse {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    /// Pooled client shared by every `send`
    client: Client,
    timeout: Option<Duration>,
    retry: RetryPolicy,
    logger: Logger,
}

impl HttpTransport {
    /// Create a transport with no timeout and the default retry policy
    pub fn new(logger: Logger) -> Result<Self> {
        Self::with_options(None, RetryPolicy::default(), logger)
    }

    /// Create a transport with explicit timeout and retry settings
    pub fn with_options(timeout: Option<Duration>, retry: RetryPolicy, logger: Logger) -> Result<Self> {
        let client = Self::build_client(true, timeout)?;
        Ok(Self {
            client,
            timeout,
            retry,
            logger: logger.named("HTTP"),
        })
    }

    fn build_client(pooled: bool, timeout: Option<Duration>) -> Result<Client> {
        let mut builder = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .tcp_nodelay(true);

        if !pooled {
            builder = builder.pool_max_idle_per_host(0);
        }

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder.build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))
    }

    /// One timed round trip on `client`
    async fn execute(client: &Client, request: &ProbeRequest) -> Result<ProbeResponse> {
        let url = reqwest::Url::parse(&request.url)?;
        let mut builder = client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let started = Instant::now();
        let response = builder.send().await?;
        let elapsed = started.elapsed();

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        response.bytes().await
            .map_err(|e| AppError::http_request(format!("Failed to read response body: {}", e)))?;

        Ok(ProbeResponse {
            status,
            headers,
            elapsed_microseconds: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        self.retry
            .run(&self.logger, |_| Self::execute(&self.client, request))
            .await
    }

    async fn send_fresh(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        let timeout = self.timeout;
        self.retry
            .run(&self.logger, |_| async move {
                let client = Self::build_client(false, timeout)?;
                Self::execute(&client, request).await
            })
            .await
    }
}
