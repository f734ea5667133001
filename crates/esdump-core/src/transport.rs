//! GET-only HTTP transport.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface so the scroller and query workers can block
//! on plain threads.

use std::io;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures_util::StreamExt;

use crate::retry::backoff_duration;

/// Error types for transport operations
#[derive(Debug)]
pub enum StreamError {
    /// Request could not be sent, or the server answered with an error status
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Response body could not be read completely
    Io(io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http { .. } => None,
            Self::Io(e) => Some(e),
        }
    }
}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Body-read failures (truncated transfer, stalled stream).
    ///
    /// This is the only class the scroller retries on its own.
    pub fn is_body_read(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Whether a send-level failure may heal by itself (used by [`HttpTransport`]).
    fn is_transient_send(&self) -> bool {
        match self {
            Self::Http { status: None, .. } => true,
            Self::Http {
                status: Some(s), ..
            } => *s == 429 || (500..=599).contains(s),
            Self::Io(_) => false,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// One GET request: target URL plus an optional JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub body: Option<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: None,
        }
    }

    pub fn get_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: Some(body.into()),
        }
    }
}

/// Blocking GET transport returning the full response body.
///
/// Implementations decide how to retry send-level failures; callers only see
/// the final outcome.
pub trait Transport: Send + Sync {
    fn get(&self, request: &Request) -> Result<Vec<u8>, StreamError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, request: &Request) -> Result<Vec<u8>, StreamError> {
        (**self).get(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, request: &Request) -> Result<Vec<u8>, StreamError> {
        (**self).get(request)
    }
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Stall detection: max time without receiving a body chunk
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    /// Send-level retries (connect errors, timeouts, 429, 5xx)
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Upper bound on the body buffer reserved up front from `Content-Length`
const MAX_PREALLOC: usize = 1 << 20;

/// Initial body buffer size; the header is only a hint and may be bogus.
fn capacity_hint(content_length: Option<u64>) -> usize {
    content_length.map_or(0, |n| n.min(MAX_PREALLOC as u64) as usize)
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(8)
            .user_agent(concat!("esdump/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StreamError::from_reqwest(&e))?;
        Ok(Self { client, config })
    }

    async fn send_with_retry(&self, request: &Request) -> Result<reqwest::Response, StreamError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;
        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_retries && e.is_transient_send() => {
                    attempt += 1;
                    let delay = backoff_duration(attempt);
                    log::warn!("request failed: {e}, retry {attempt}/{max_retries} in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &Request) -> Result<reqwest::Response, StreamError> {
        let mut builder = self.client.get(&request.url);
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }
        builder
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StreamError::from_reqwest(&e))
    }

    /// Drain the body chunk by chunk; a stall or a broken stream is an `Io` error.
    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, StreamError> {
        let read_timeout = self.config.read_timeout;
        let mut body = Vec::with_capacity(capacity_hint(response.content_length()));
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(read_timeout, stream.next())
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("read timeout ({}s with no data)", read_timeout.as_secs()),
                    )
                })?;
            match next {
                Some(Ok(chunk)) => body.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    return Err(StreamError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("body read failed after {} bytes: {e}", body.len()),
                    )));
                }
                None => return Ok(body),
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &Request) -> Result<Vec<u8>, StreamError> {
        SHARED_RUNTIME.handle().block_on(async {
            let response = self.send_with_retry(request).await?;
            self.read_body(response).await
        })
    }
}
