//! HTTP GET transport used by the prober

use std::time::Duration;

use async_trait::async_trait;

/// Default IP-echo endpoint (JSON body with an `origin` field)
pub const DEFAULT_ECHO_URL: &str = "https://httpbin.org/ip";

/// Default echo request timeout in seconds
pub const DEFAULT_ECHO_TIMEOUT_SECS: u64 = 5;

/// Default verification page request timeout in seconds
pub const DEFAULT_TARGET_TIMEOUT_SECS: u64 = 10;

/// Status line and full text body of a completed GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("reading body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out after {secs} s")]
    Timeout { url: String, secs: u64 },
}

/// Something that can perform a GET with a per-request timeout
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError>;
}

/// `Fetch` backed by a shared reqwest client
#[derive(Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for ReqwestFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        tracing::debug!("GET {} (timeout {} s)", url, timeout.as_secs());
        let timed_out = || FetchError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        };
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    timed_out()
                } else {
                    FetchError::Request {
                        url: url.to_string(),
                        source,
                    }
                }
            })?;
        let status = response.status().as_u16();
        // The timeout also covers the body read
        let body = response.text().await.map_err(|source| {
            if source.is_timeout() {
                timed_out()
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    source,
                }
            }
        })?;
        tracing::debug!("GET {}: HTTP {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

/// Scripted `Fetch` for exercising callers without a network
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub enum Reply {
        Ok(u16, &'static str),
        Timeout,
    }

    /// Answers from a URL table and records every requested URL; unknown URLs time out
    pub struct FakeFetcher {
        replies: HashMap<String, Reply>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new<S: Into<String>>(replies: Vec<(S, Reply)>) -> Self {
            Self {
                replies: replies.into_iter().map(|(url, r)| (url.into(), r)).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.replies.get(url) {
                Some(Reply::Ok(status, body)) => Ok(HttpResponse {
                    status: *status,
                    body: body.to_string(),
                }),
                Some(Reply::Timeout) | None => Err(FetchError::Timeout {
                    url: url.to_string(),
                    secs: timeout.as_secs(),
                }),
            }
        }
    }
}
