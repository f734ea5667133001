//! The three retrieval modes and the settings they share

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use esdump_core::progress::fmt_num;
use esdump_core::{
    DumpOptions, HttpTransport, IdConfig, Operator, QueryConfig, QueryPayload, ScrollConfig,
    Scroller, SharedProgress, dump_scroll, fetch_ids, normalize_query, run_queries,
};

use crate::Cli;
use crate::config::{Config, DEFAULT_SERVER};

/// Config file values with command-line overrides applied
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: String,
    pub index: String,
    pub ttl: String,
    pub size: usize,
    pub workers: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub batch_size: usize,
    pub op: Operator,
    pub limit: Option<u64>,
    pub uri_query: bool,
    pub per_hit: bool,
    pub http: esdump_core::HttpConfig,
}

impl Settings {
    pub(crate) fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let server = cli
            .server
            .clone()
            .or_else(|| config.server.url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let op = match cli.op {
            Some(op) => op,
            None => config
                .query
                .default_operator
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid query.default_operator in config")?,
        };
        let size = cli.size.unwrap_or(config.scroll.size);
        if size == 0 {
            bail!("page size must be at least 1");
        }

        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            index: cli
                .index
                .clone()
                .unwrap_or_else(|| config.server.index.clone()),
            ttl: cli.scroll.clone().unwrap_or_else(|| config.scroll.ttl.clone()),
            size,
            workers: cli.workers.unwrap_or(config.query.workers).max(1),
            max_retries: cli.max_retries.unwrap_or(config.scroll.max_retries),
            retry_delay: Duration::from_secs(config.scroll.retry_delay_secs),
            batch_size: cli.batch_size.unwrap_or(config.ids.batch_size).max(1),
            op,
            limit: cli.limit,
            uri_query: cli.uri_query,
            per_hit: cli.hits,
            http: config.http.into(),
        })
    }
}

/// Buffered sink over `path`, or stdout.
pub fn open_sink(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

/// Query text from `--query`, `--query-file`, or empty (match all).
pub fn read_query(query: Option<&str>, file: Option<&Path>) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file: {}", path.display()));
    }
    Ok(query.unwrap_or_default().to_string())
}

fn read_queries(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read query list: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn scroll_payload(query: &str, settings: &Settings) -> QueryPayload {
    if settings.uri_query {
        let q = query.trim();
        QueryPayload::Uri(if q.is_empty() { "*".to_string() } else { q.to_string() })
    } else {
        QueryPayload::Body(normalize_query(query, settings.op))
    }
}

/// Print a key-value summary table on stderr
fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

/// Scroll through the whole result set. Returns true if interrupted.
pub fn scroll<W: Write>(
    transport: HttpTransport,
    settings: &Settings,
    query: &str,
    sink: &mut W,
    stop: &AtomicBool,
    progress: &SharedProgress,
) -> Result<bool> {
    let mut config = ScrollConfig::new(
        settings.server.clone(),
        settings.index.clone(),
        scroll_payload(query, settings),
    );
    config.size = settings.size;
    config.scroll = settings.ttl.clone();
    config.max_retries = settings.max_retries;
    config.retry_delay = settings.retry_delay;

    log::info!("Scrolling {}/{}", settings.server, settings.index);
    log::debug!("  Query: {:?}", config.query);

    let options = DumpOptions {
        limit: settings.limit,
        per_hit: settings.per_hit,
    };
    let pb = progress.scroll_line(&settings.index);
    let result = dump_scroll(Scroller::new(config, transport), sink, options, stop, &pb);
    pb.finish_and_clear();
    let summary =
        result.with_context(|| format!("Scroll over {}/{} failed", settings.server, settings.index))?;

    if progress.is_tty() {
        let unit = if settings.per_hit { "hits" } else { "pages" };
        print_summary(
            "Scroll",
            &[
                ("Index", settings.index.clone()),
                ("Documents", fmt_num(summary.received)),
                ("Pages", fmt_num(summary.pages)),
                ("Written", format!("{} {unit}", fmt_num(summary.written))),
                ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
            ],
        );
    }
    if summary.interrupted {
        log::warn!("Interrupted after {} documents", summary.received);
    }
    Ok(summary.interrupted)
}

/// One query per line of `path`, run in parallel.
pub fn multi_query<W: Write + Send>(
    transport: &HttpTransport,
    settings: &Settings,
    path: &Path,
    sink: &mut W,
    progress: &SharedProgress,
) -> Result<()> {
    let queries = read_queries(path)?;
    let config = QueryConfig {
        server: settings.server.clone(),
        index: settings.index.clone(),
        size: settings.size,
        workers: settings.workers,
    };

    let pb = progress.count_bar("queries", queries.len() as u64);
    let result = run_queries(transport, &config, &queries, sink, &pb);
    pb.finish_and_clear();
    let summary = result.context("Multi-query run failed")?;

    if progress.is_tty() {
        print_summary(
            "Queries",
            &[
                ("Queries", fmt_num(summary.queries as u64)),
                ("Written", fmt_num(summary.written as u64)),
                ("Bytes", fmt_num(summary.bytes)),
                ("Workers", settings.workers.to_string()),
                ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
            ],
        );
    }
    Ok(())
}

/// Look up identifiers read from `source` (a path, or "-" for stdin).
pub fn ids<W: Write>(
    transport: &HttpTransport,
    settings: &Settings,
    source: &str,
    sink: &mut W,
    progress: &SharedProgress,
) -> Result<()> {
    let config = IdConfig {
        server: settings.server.clone(),
        index: settings.index.clone(),
        batch_size: settings.batch_size,
    };

    let result = if source == "-" {
        fetch_ids(transport, &config, io::stdin().lock(), sink)
    } else {
        let file = File::open(source)
            .with_context(|| format!("Failed to open identifier list: {source}"))?;
        fetch_ids(transport, &config, BufReader::new(file), sink)
    };
    let summary = result.context("Identifier lookup failed")?;

    if progress.is_tty() {
        print_summary(
            "Lookup",
            &[
                ("Identifiers", fmt_num(summary.ids as u64)),
                ("Requests", fmt_num(summary.requests as u64)),
                ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
            ],
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn settings(args: &[&str]) -> Settings {
        let cli = Cli::parse_from(std::iter::once("esdump").chain(args.iter().copied()));
        Settings::resolve(&cli, &Config::default()).unwrap()
    }

    #[test]
    fn defaults_from_config() {
        let s = settings(&[]);
        assert_eq!(s.server, DEFAULT_SERVER);
        assert_eq!(s.index, "fatcat_release");
        assert_eq!(s.ttl, "10m");
        assert_eq!(s.size, 1000);
        assert_eq!(s.op, Operator::And);
        assert_eq!(s.retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn flags_override_config() {
        let s = settings(&[
            "-s", "http://localhost:9200/", "-i", "papers", "--scroll", "1m", "--size", "50",
            "-w", "3", "--op", "or", "--max-retries", "2", "--hits", "-l", "10",
        ]);
        assert_eq!(s.server, "http://localhost:9200");
        assert_eq!(s.index, "papers");
        assert_eq!(s.ttl, "1m");
        assert_eq!(s.size, 50);
        assert_eq!(s.workers, 3);
        assert_eq!(s.op, Operator::Or);
        assert_eq!(s.max_retries, 2);
        assert!(s.per_hit);
        assert_eq!(s.limit, Some(10));
    }

    #[test]
    fn zero_page_size_rejected() {
        let cli = Cli::parse_from(["esdump", "--size", "0"]);
        assert!(Settings::resolve(&cli, &Config::default()).is_err());
    }

    #[test]
    fn bad_operator_in_config_rejected() {
        let cli = Cli::parse_from(["esdump"]);
        let mut config = Config::default();
        config.query.default_operator = "XOR".to_string();
        assert!(Settings::resolve(&cli, &config).is_err());
    }

    #[test]
    fn ids_and_mq_conflict() {
        assert!(Cli::try_parse_from(["esdump", "--ids", "-", "--mq", "q.txt"]).is_err());
    }

    #[test]
    fn payload_selection() {
        let mut s = settings(&[]);
        match scroll_payload("", &s) {
            QueryPayload::Body(body) => assert!(body.contains("match_all")),
            other => panic!("unexpected payload {other:?}"),
        }
        s.uri_query = true;
        match scroll_payload("  ", &s) {
            QueryPayload::Uri(q) => assert_eq!(q, "*"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn query_from_file_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("query.json");
        std::fs::write(&path, r#"{"query":{"match_all":{}}}"#).unwrap();
        let q = read_query(Some("ignored"), Some(&path)).unwrap();
        assert_eq!(q, r#"{"query":{"match_all":{}}}"#);
        assert_eq!(read_query(None, None).unwrap(), "");
    }

    #[test]
    fn query_list_skips_blank_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("queries.txt");
        std::fs::write(&path, "title:foo\n\n  year:2020  \n").unwrap();
        assert_eq!(read_queries(&path).unwrap(), vec!["title:foo", "year:2020"]);
    }

    #[test]
    fn file_sink_is_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.ndjson");
        {
            let mut sink = open_sink(Some(&path)).unwrap();
            sink.write_all(b"{}\n").unwrap();
            sink.flush().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }
}
