//! Fake transports for unit tests

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::transport::{Request, StreamError, Transport};

/// Scroll page body with `hits` placeholder documents.
pub fn page(scroll_id: &str, hits: usize, total: u64) -> Vec<u8> {
    let docs: Vec<serde_json::Value> = (0..hits)
        .map(|i| serde_json::json!({"_id": i.to_string(), "_source": {"n": i}}))
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "_scroll_id": scroll_id,
        "took": 1,
        "hits": {"total": total, "hits": docs},
    }))
    .unwrap()
}

pub fn truncated() -> StreamError {
    StreamError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected EOF"))
}

/// Replays a fixed sequence of responses and records every request.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Vec<u8>, StreamError>>>,
    requests: Mutex<Vec<Request>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<Vec<u8>, StreamError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, request: &Request) -> Result<Vec<u8>, StreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(StreamError::Http {
                    status: None,
                    message: "script exhausted".to_string(),
                })
            })
    }
}

/// Answers each request through a closure; safe to share across threads.
pub struct FnTransport<F>(F);

impl<F> FnTransport<F>
where
    F: Fn(&Request) -> Result<Vec<u8>, StreamError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(&Request) -> Result<Vec<u8>, StreamError> + Send + Sync,
{
    fn get(&self, request: &Request) -> Result<Vec<u8>, StreamError> {
        (self.0)(request)
    }
}

/// Value of query parameter `key` in `url`, decoded.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let url = reqwest::Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
