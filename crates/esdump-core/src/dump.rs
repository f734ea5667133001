//! Drive a scroller to completion, streaming pages (or hits) to a sink

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::ProgressBar;

use crate::error::DumpError;
use crate::progress::show_scroll;
use crate::scroll::Scroller;
use crate::transport::Transport;

/// What to write and when to stop early
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    /// Stop once this many documents were received (pages) or written (hits)
    pub limit: Option<u64>,
    /// Write one raw hit per line instead of one raw page per line
    pub per_hit: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    pub pages: u64,
    /// Documents received from the server
    pub received: u64,
    /// Lines written to the sink
    pub written: u64,
    pub elapsed: Duration,
    pub limited: bool,
    pub interrupted: bool,
}

fn write_line<W: Write>(sink: &mut W, line: &[u8]) -> Result<(), DumpError> {
    sink.write_all(line).map_err(DumpError::Sink)?;
    sink.write_all(b"\n").map_err(DumpError::Sink)
}

/// Advance `scroller` until the result set ends, the limit is hit, `stop`
/// is raised, or an error occurs. `stop` is only checked between pages.
///
/// Whatever was written before an error stays in the sink.
pub fn dump_scroll<T, W>(
    mut scroller: Scroller<T>,
    sink: &mut W,
    options: DumpOptions,
    stop: &AtomicBool,
    pb: &ProgressBar,
) -> Result<DumpSummary, DumpError>
where
    T: Transport,
    W: Write,
{
    let mut summary = DumpSummary::default();
    let limit = options.limit.unwrap_or(u64::MAX);

    while scroller.advance() {
        summary.pages += 1;
        if options.per_hit {
            if let Some(page) = scroller.page() {
                for hit in &page.hits.hits {
                    if summary.written >= limit {
                        break;
                    }
                    write_line(sink, hit.get().as_bytes())?;
                    summary.written += 1;
                }
            }
        } else {
            write_line(sink, scroller.bytes())?;
            summary.written += 1;
        }
        show_scroll(pb, scroller.total(), scroller.reported_total());

        let reached = if options.per_hit {
            summary.written
        } else {
            scroller.total()
        };
        if reached >= limit {
            log::info!("limit of {limit} documents reached");
            summary.limited = true;
            break;
        }
        if stop.load(Ordering::Relaxed) {
            log::warn!("shutdown requested, stopping after {} pages", summary.pages);
            summary.interrupted = true;
            break;
        }
    }
    sink.flush().map_err(DumpError::Sink)?;

    summary.received = scroller.total();
    summary.elapsed = scroller.elapsed();
    if let Some(e) = scroller.into_err() {
        return Err(e);
    }
    log::info!(
        "{} documents in {} pages, {:.1}s",
        summary.received,
        summary.pages,
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::{QueryPayload, ScrollConfig};
    use crate::testing::{page, ScriptedTransport};

    fn scroller(transport: &ScriptedTransport) -> Scroller<&ScriptedTransport> {
        let config = ScrollConfig::new(
            "http://es:9200",
            "docs",
            QueryPayload::Body("{}".to_string()),
        );
        Scroller::new(config, transport)
    }

    fn script() -> ScriptedTransport {
        ScriptedTransport::new(vec![
            Ok(page("a", 3, 7)),
            Ok(page("b", 3, 7)),
            Ok(page("c", 1, 7)),
            Ok(page("d", 0, 7)),
        ])
    }

    fn run(transport: &ScriptedTransport, options: DumpOptions) -> (DumpSummary, Vec<u8>) {
        let mut sink = Vec::new();
        let summary = dump_scroll(
            scroller(transport),
            &mut sink,
            options,
            &AtomicBool::new(false),
            &ProgressBar::hidden(),
        )
        .unwrap();
        (summary, sink)
    }

    #[test]
    fn pages_written_one_per_line() {
        let transport = script();
        let (summary, sink) = run(&transport, DumpOptions::default());
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.received, 7);
        assert_eq!(summary.written, 3);
        let text = String::from_utf8(sink).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].as_bytes(), page("a", 3, 7).as_slice());
    }

    #[test]
    fn hits_written_one_per_line() {
        let transport = script();
        let options = DumpOptions {
            per_hit: true,
            ..Default::default()
        };
        let (summary, sink) = run(&transport, options);
        assert_eq!(summary.written, 7);
        let text = String::from_utf8(sink).unwrap();
        assert_eq!(text.lines().count(), 7);
        assert!(text.lines().all(|l| l.starts_with("{\"_id\"")));
    }

    #[test]
    fn page_limit_stops_after_reaching_page() {
        let transport = script();
        let options = DumpOptions {
            limit: Some(4),
            per_hit: false,
        };
        let (summary, _) = run(&transport, options);
        assert!(summary.limited);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.received, 6);
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn hit_limit_is_exact() {
        let transport = script();
        let options = DumpOptions {
            limit: Some(4),
            per_hit: true,
        };
        let (summary, sink) = run(&transport, options);
        assert!(summary.limited);
        assert_eq!(summary.written, 4);
        assert_eq!(String::from_utf8(sink).unwrap().lines().count(), 4);
    }

    #[test]
    fn stop_flag_checked_between_pages() {
        let transport = script();
        let mut sink = Vec::new();
        let summary = dump_scroll(
            scroller(&transport),
            &mut sink,
            DumpOptions::default(),
            &AtomicBool::new(true),
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.pages, 1);
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn error_keeps_partial_output() {
        let transport = ScriptedTransport::new(vec![Ok(page("a", 2, 10)), Ok(b"oops".to_vec())]);
        let mut sink = Vec::new();
        let err = dump_scroll(
            scroller(&transport),
            &mut sink,
            DumpOptions::default(),
            &AtomicBool::new(false),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, DumpError::Protocol(_)));
        assert_eq!(String::from_utf8(sink).unwrap().lines().count(), 1);
    }
}
