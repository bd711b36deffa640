//! HTTP fetcher implementation
//!
//! This module handles the raw HTTP side of every engine variant:
//! - Building HTTP clients with the configured user agent
//! - GET requests returning the body, final URL and Content-Type
//! - Error classification into timeouts, HTTP statuses and network errors
//! - Owning (and dropping) the client as recyclable per-fetch state

use crate::config::UserAgentConfig;
use crate::engine::{FetchError, RawContent};
use crate::url::CanonicalUrl;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound for a whole request
/// * `accept` - Value of the `Accept` header sent with every request
///
/// # Example
///
/// ```no_run
/// use docrawl::config::UserAgentConfig;
/// use docrawl::engine::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30), "text/html").unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
    accept: &str,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(accept) {
        headers.insert(ACCEPT, value);
    }

    Client::builder()
        .user_agent(config.header_value())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Heavy per-fetch HTTP state shared by every engine variant
///
/// The client (with its connection pool) is built on `acquire`, dropped
/// on `release`, and rebuilt on `recycle`. `bytes_retained` counts body
/// bytes that passed through since the last recycle.
#[derive(Debug)]
pub struct HttpContext {
    user_agent: UserAgentConfig,
    timeout: Duration,
    accept: &'static str,
    client: Option<Client>,
    bytes_retained: usize,
}

impl HttpContext {
    pub fn new(user_agent: UserAgentConfig, timeout: Duration, accept: &'static str) -> Self {
        Self {
            user_agent,
            timeout,
            accept,
            client: None,
            bytes_retained: 0,
        }
    }

    /// Builds the client if it does not exist yet
    pub fn acquire(&mut self) -> Result<&Client, FetchError> {
        if self.client.is_none() {
            let client = build_http_client(&self.user_agent, self.timeout, self.accept)
                .map_err(|e| FetchError::Network {
                    url: String::new(),
                    message: format!("failed to build HTTP client: {}", e),
                })?;
            self.client = Some(client);
        }

        self.client.as_ref().ok_or_else(|| FetchError::Network {
            url: String::new(),
            message: "HTTP client unavailable".to_string(),
        })
    }

    /// Drops the client and its pooled connections, then rebuilds it
    pub fn recycle(&mut self) -> Result<(), FetchError> {
        self.release();
        self.acquire().map(|_| ())
    }

    pub fn release(&mut self) {
        self.client = None;
        self.bytes_retained = 0;
    }

    pub fn is_acquired(&self) -> bool {
        self.client.is_some()
    }

    pub fn memory_usage_estimate(&self) -> usize {
        self.bytes_retained
    }

    /// Fetches `endpoint` on behalf of the canonical page URL `requested`
    pub async fn get(
        &mut self,
        requested: &CanonicalUrl,
        endpoint: &Url,
    ) -> Result<RawContent, FetchError> {
        let client = self.acquire()?.clone();
        let raw = fetch_url(&client, requested, endpoint).await?;
        self.bytes_retained = self.bytes_retained.saturating_add(raw.body.len());
        Ok(raw)
    }
}

/// Fetches a URL and classifies failures
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `Ok(RawContent)` |
/// | Any other status | `FetchError::Status` |
/// | Client timeout | `FetchError::Timeout` |
/// | Connection / TLS / body error | `FetchError::Network` |
pub async fn fetch_url(
    client: &Client,
    requested: &CanonicalUrl,
    endpoint: &Url,
) -> Result<RawContent, FetchError> {
    let url = endpoint.as_str();

    let response = client
        .get(endpoint.clone())
        .send()
        .await
        .map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = response
        .text()
        .await
        .map_err(|e| classify_error(url, e))?;

    Ok(RawContent {
        requested: requested.clone(),
        final_url,
        content_type,
        body,
    })
}

fn classify_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
