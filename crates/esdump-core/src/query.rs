//! Parallel query runner: many independent, non-paginated searches.
//!
//! Each query runs on its own scoped thread once it holds a permit from the
//! admission gate. Bodies go over a bounded channel to a single writer thread,
//! the only code that touches the sink.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::error::DumpError;
use crate::scroll::encode_component;
use crate::semaphore::Semaphore;
use crate::transport::{Request, Transport};

/// Settings for a batch of independent queries
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub server: String,
    pub index: String,
    /// Hits requested per query
    pub size: usize,
    /// Max queries in flight
    pub workers: usize,
}

/// Outcome of a successful run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QuerySummary {
    pub queries: usize,
    pub written: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Search URL for one query string.
pub fn query_url(config: &QueryConfig, query: &str) -> String {
    format!(
        "{}/{}/_search?size={}&q={}",
        config.server,
        config.index,
        config.size,
        encode_component(query)
    )
}

/// Run every query, writing each raw response plus `\n` to `sink` in
/// completion order.
///
/// The first failing query closes the admission gate; queries already in
/// flight finish and their results are still written. Returns that first
/// error, or a sink error if writing failed. Output written before a failure
/// stays in the sink.
pub fn run_queries<T, W>(
    transport: &T,
    config: &QueryConfig,
    queries: &[String],
    sink: &mut W,
    pb: &ProgressBar,
) -> Result<QuerySummary, DumpError>
where
    T: Transport + ?Sized,
    W: Write + Send,
{
    let start = Instant::now();
    let workers = config.workers.max(1);
    log::info!(
        "running {} queries against {}/{} with {workers} workers",
        queries.len(),
        config.server,
        config.index
    );

    let gate = Semaphore::new(workers);
    let first_error: Mutex<Option<DumpError>> = Mutex::new(None);
    let failed = AtomicUsize::new(0);
    let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(workers);

    let writer_result = std::thread::scope(|s| {
        let writer_gate = &gate;
        let writer = s.spawn(move || {
            let result = drain(rx, sink);
            if let Err(e) = &result {
                log::error!("writing results failed: {e}");
                writer_gate.close();
            }
            result
        });

        for (i, query) in queries.iter().enumerate() {
            let Some(permit) = gate.acquire() else {
                log::warn!("not scheduling {} remaining queries", queries.len() - i);
                break;
            };
            let tx = tx.clone();
            let (gate, first_error, failed) = (&gate, &first_error, &failed);
            s.spawn(move || {
                let request = Request::get(query_url(config, query));
                match transport.get(&request) {
                    Ok(body) => {
                        drop(permit);
                        pb.inc(1);
                        // Writer gone means the sink failed; that error is reported by the writer.
                        if tx.send(body).is_err() {
                            gate.close();
                        }
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        log::error!("query {i} failed: {e}");
                        let mut slot = first_error.lock().unwrap_or_else(|p| p.into_inner());
                        if slot.is_none() {
                            *slot = Some(DumpError::Transport(e));
                        }
                        drop(slot);
                        gate.close();
                        drop(permit);
                    }
                }
            });
        }
        // Close our end so the writer stops once the last job is done.
        drop(tx);

        writer
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("writer thread panicked")))
    });

    let failed = failed.into_inner();
    if failed > 1 {
        log::warn!("{failed} queries failed, reporting the first");
    }
    if let Some(e) = first_error.into_inner().unwrap_or_else(|p| p.into_inner()) {
        return Err(e);
    }
    let (written, bytes) = writer_result.map_err(DumpError::Sink)?;
    let summary = QuerySummary {
        queries: queries.len(),
        written,
        bytes,
        elapsed: start.elapsed(),
    };
    log::info!(
        "{} responses written ({} bytes) in {:.1}s",
        summary.written,
        summary.bytes,
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}

/// Append each body plus a newline; stop at the first write error.
fn drain<W: Write>(rx: Receiver<Vec<u8>>, sink: &mut W) -> std::io::Result<(usize, u64)> {
    let mut written = 0;
    let mut bytes = 0u64;
    for blob in rx {
        sink.write_all(&blob)?;
        sink.write_all(b"\n")?;
        written += 1;
        bytes += blob.len() as u64 + 1;
    }
    sink.flush()?;
    Ok((written, bytes))
}
