//! Scroll cursor over a search result set.
//!
//! Uses GET for every request, including continuations, since some public
//! endpoints reject every other verb. No clear-scroll call is made when the
//! cursor is dropped; the server expires the context after the TTL.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::envelope::{Envelope, HitsTotal};
use crate::error::DumpError;
use crate::progress::fmt_num;
use crate::retry::retry_body_reads;
use crate::text::{shorten, trim};
use crate::transport::{Request, Transport};

/// Delay between attempts after a truncated continuation body
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// How the query travels on the initiating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPayload {
    /// JSON request body, already in the server's query DSL
    Body(String),
    /// Lucene query string sent as the `q` URL parameter
    Uri(String),
}

/// Parameters of one scroll session
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Base URL, e.g. `https://search.fatcat.wiki`
    pub server: String,
    pub index: String,
    pub query: QueryPayload,
    /// Documents per page
    pub size: usize,
    /// Scroll context TTL, e.g. `10m`
    pub scroll: String,
    /// Failed body reads tolerated per continuation page
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ScrollConfig {
    pub fn new(server: impl Into<String>, index: impl Into<String>, query: QueryPayload) -> Self {
        Self {
            server: server.into(),
            index: index.into(),
            query,
            size: 1000,
            scroll: "10m".to_string(),
            max_retries: 5,
            retry_delay: RETRY_DELAY,
        }
    }
}

#[derive(Serialize)]
struct ContinuationBody<'a> {
    scroll: &'a str,
    scroll_id: &'a str,
}

#[derive(Debug)]
enum State {
    /// No request made yet
    Pending,
    /// Token from the most recent page
    Scrolling { scroll_id: String },
    /// Terminal; every further `advance` is a no-op
    Failed(DumpError),
}

/// Iterates a result set page by page.
///
/// ```ignore
/// let mut scroller = Scroller::new(config, transport);
/// while scroller.advance() {
///     sink.write_all(scroller.bytes())?;
/// }
/// if let Some(e) = scroller.err() { ... }
/// ```
pub struct Scroller<T> {
    config: ScrollConfig,
    transport: T,
    state: State,
    buf: Vec<u8>,
    total: u64,
    reported_total: Option<HitsTotal>,
    started: Option<Instant>,
}

impl<T: Transport> Scroller<T> {
    pub fn new(config: ScrollConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: State::Pending,
            buf: Vec::new(),
            total: 0,
            reported_total: None,
            started: None,
        }
    }

    /// Fetch the next page.
    ///
    /// Returns false when the scroll is exhausted or failed; check [`err`](Self::err)
    /// to tell them apart. The first successful call always returns true.
    pub fn advance(&mut self) -> bool {
        let request = match &self.state {
            State::Failed(_) => return false,
            State::Pending => None,
            State::Scrolling { scroll_id } => Some(self.continuation_request(scroll_id)),
        };
        let result = match request {
            None => self.first_page(),
            Some(request) => request.and_then(|request| self.next_page(&request)),
        };
        match result {
            Ok(more) => more,
            Err(e) => {
                log::error!("scroll failed: {e}");
                self.state = State::Failed(e);
                false
            }
        }
    }

    fn initial_request(&self) -> Request {
        let ScrollConfig {
            server,
            index,
            size,
            scroll,
            ..
        } = &self.config;
        let link = format!("{server}/{index}/_search?scroll={scroll}&size={size}");
        match &self.config.query {
            QueryPayload::Body(body) => Request::get_json(link, body.as_str()),
            QueryPayload::Uri(q) => Request::get(format!("{link}&q={}", encode_component(q))),
        }
    }

    fn continuation_request(&self, scroll_id: &str) -> Result<Request, DumpError> {
        let body = serde_json::to_string(&ContinuationBody {
            scroll: &self.config.scroll,
            scroll_id,
        })?;
        Ok(Request::get_json(
            format!("{}/_search/scroll", self.config.server),
            body,
        ))
    }

    fn first_page(&mut self) -> Result<bool, DumpError> {
        self.started = Some(Instant::now());
        let request = self.initial_request();
        log::debug!("init: {}", request.url);
        self.buf = self.transport.get(&request)?;

        let (envelope, scroll_id) = Envelope::parse_scroll(&self.buf)?;
        self.total += envelope.hit_count() as u64;
        self.reported_total = envelope.total();
        log::info!(
            "init: {} of {} documents, scroll {}",
            fmt_num(self.total),
            fmt_reported(self.reported_total),
            trim(&scroll_id, 25, "...")
        );
        self.state = State::Scrolling { scroll_id };
        Ok(true)
    }

    fn next_page(&mut self, request: &Request) -> Result<bool, DumpError> {
        log::debug!(
            "{} [{}] [...]",
            request.url,
            request.body.as_ref().map_or(0, String::len)
        );
        let transport = &self.transport;
        self.buf = retry_body_reads(
            &request.url,
            self.config.max_retries,
            self.config.retry_delay,
            || transport.get(request),
        )?;

        let (envelope, scroll_id) = Envelope::parse_scroll(&self.buf)?;
        let hits = envelope.hit_count() as u64;
        let reported = envelope.total();
        self.total += hits;
        self.reported_total = reported;

        match reported {
            Some(t) => log::info!(
                "fetched={}/{} ({:.2}%), received={}",
                fmt_num(self.total),
                fmt_num(t.value()),
                percent(self.total, t.value()),
                self.buf.len()
            ),
            None => log::info!(
                "fetched={}, received={}",
                fmt_num(self.total),
                self.buf.len()
            ),
        }
        log::debug!("{}", shorten(&scroll_id, 40));
        self.state = State::Scrolling { scroll_id };

        if let Some(t) = reported.filter(|_| hits == 0) {
            if self.total != t.value() {
                log::warn!(
                    "partial result: received {} of {} reported documents",
                    self.total,
                    t.value()
                );
            }
        }
        // Without an exact total only an empty page marks the end.
        let within_total = match reported {
            Some(t) if t.is_exact() => self.total <= t.value(),
            _ => true,
        };
        Ok(hits > 0 && within_total)
    }

    /// Raw body of the most recent page.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Raw body of the most recent page as text.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    /// Decoded view of the most recent page, if there is one.
    pub fn page(&self) -> Option<Envelope<'_>> {
        if self.buf.is_empty() {
            return None;
        }
        Envelope::parse(&self.buf).ok()
    }

    pub fn err(&self) -> Option<&DumpError> {
        match &self.state {
            State::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Consume the cursor, returning its terminal error if any.
    pub fn into_err(self) -> Option<DumpError> {
        match self.state {
            State::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Continuation token in use, if the first page has been received.
    pub fn scroll_id(&self) -> Option<&str> {
        match &self.state {
            State::Scrolling { scroll_id } => Some(scroll_id),
            _ => None,
        }
    }

    /// Time since the first `advance` call.
    pub fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Documents received so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Total the server reported on the most recent page.
    pub fn reported_total(&self) -> Option<HitsTotal> {
        self.reported_total
    }
}

fn fmt_reported(total: Option<HitsTotal>) -> String {
    total.map_or_else(|| "?".to_string(), |t| fmt_num(t.value()))
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 100.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Percent-encode a query string parameter value (form encoding, spaces as `+`).
pub(crate) fn encode_component(s: &str) -> String {
    let mut url = reqwest::Url::parse("http://localhost/").expect("static URL");
    url.query_pairs_mut().append_pair("q", s);
    url.query()
        .and_then(|q| q.strip_prefix("q="))
        .unwrap_or_default()
        .to_string()
}
