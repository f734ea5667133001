//! Document lookup by identifier, in fixed-size batches.

use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::DumpError;
use crate::transport::{Request, Transport};

/// Settings for identifier lookups
#[derive(Debug, Clone)]
pub struct IdConfig {
    pub server: String,
    pub index: String,
    /// Identifiers per `_mget` request
    pub batch_size: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdSummary {
    pub ids: usize,
    pub requests: usize,
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct MgetBody<'a> {
    ids: &'a [String],
}

/// Read identifiers one per line; surrounding whitespace and blank lines are dropped.
pub fn read_ids<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// Multi-get request for one batch.
pub fn mget_request(config: &IdConfig, batch: &[String]) -> Result<Request, DumpError> {
    let body = serde_json::to_string(&MgetBody { ids: batch })?;
    Ok(Request::get_json(
        format!("{}/{}/_mget", config.server, config.index),
        body,
    ))
}

/// Look up every identifier from `reader`, writing each raw response plus
/// `\n` to `sink` in submission order. Stops at the first failure.
pub fn fetch_ids<T, R, W>(
    transport: &T,
    config: &IdConfig,
    reader: R,
    sink: &mut W,
) -> Result<IdSummary, DumpError>
where
    T: Transport + ?Sized,
    R: BufRead,
    W: Write,
{
    let start = Instant::now();
    let ids = read_ids(reader).map_err(DumpError::Input)?;
    let batch_size = config.batch_size.max(1);
    log::info!(
        "looking up {} ids in batches of {batch_size}",
        ids.len()
    );

    let mut requests = 0;
    for batch in ids.chunks(batch_size) {
        let request = mget_request(config, batch)?;
        let body = transport.get(&request)?;
        sink.write_all(&body).map_err(DumpError::Sink)?;
        sink.write_all(b"\n").map_err(DumpError::Sink)?;
        requests += 1;
        log::debug!("batch {requests}: {} ids, {} bytes", batch.len(), body.len());
    }
    sink.flush().map_err(DumpError::Sink)?;

    Ok(IdSummary {
        ids: ids.len(),
        requests,
        elapsed: start.elapsed(),
    })
}
