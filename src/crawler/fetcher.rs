//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests against a site origin:
//! - Building HTTP clients with an identifying user agent string
//! - GET requests for pages and resources
//! - Error classification into fetch results

use crate::config::UserAgentConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Maximum number of redirects followed for a single request
const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the URL
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: Option<String>,
        /// Response body
        body: Vec<u8>,
    },

    /// Non-success HTTP status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, body read failure, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Describes a failed fetch for logs and page outcomes
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            FetchResult::Success { .. } => None,
            FetchResult::HttpError { status_code } => Some(format!("HTTP {}", status_code)),
            FetchResult::NetworkError { error } => Some(error.clone()),
        }
    }
}

/// Formats the identifying user agent string
///
/// Format: `CrawlerName/Version (+ContactURL)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{})",
        config.crawler_name, config.crawler_version, config.contact_url
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use static_mirror::config::UserAgentConfig;
/// use static_mirror::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the outcome
///
/// | Condition           | Result         |
/// |---------------------|----------------|
/// | HTTP 2xx            | `Success`      |
/// | Any other status    | `HttpError`    |
/// | Timeout             | `NetworkError` |
/// | Connection refused  | `NetworkError` |
/// | Body read failure   | `NetworkError` |
///
/// Nothing is retried; callers record a failed resource as a no-op for the
/// rest of the crawl.
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                "Connection refused".to_string()
            } else if e.is_redirect() {
                format!("Redirect error: {}", e)
            } else {
                e.to_string()
            };
            return FetchResult::NetworkError { error };
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match response.bytes().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body: body.to_vec(),
        },
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
        },
    }
}
