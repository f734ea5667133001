//! esdump - dump documents from an elasticsearch index
//!
//! Scrolls through the full result set of a query, runs many small queries
//! in parallel, or looks up documents by identifier. Raw responses go to
//! stdout (or a file), one per line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;

use esdump_core::{HttpTransport, Operator};

mod config;
mod modes;

use config::Config;
use modes::Settings;

const EXAMPLES: &str = "\
Examples:
  esdump -q 'affiliation:\"alberta\"' > docs.ndjson
  esdump -i papers --hits -l 10000 -o sample.ndjson
  esdump --mq queries.txt -w 8
  cat ids.txt | esdump --ids -";

#[derive(Parser, Debug)]
#[command(name = "esdump")]
#[command(about = "Dump documents from an elasticsearch index")]
#[command(version, after_help = EXAMPLES)]
struct Cli {
    /// Query string or JSON query; empty matches all documents
    #[arg(short, long, conflicts_with = "query_file")]
    query: Option<String>,

    /// Read the query from a file
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Index name
    #[arg(short, long)]
    index: Option<String>,

    /// Server base URL
    #[arg(short, long)]
    server: Option<String>,

    /// Scroll context TTL, e.g. 10m
    #[arg(long)]
    scroll: Option<String>,

    /// Documents per page
    #[arg(long)]
    size: Option<usize>,

    /// Number of parallel workers (multi-query mode)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop after this many documents
    #[arg(short, long)]
    limit: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Look up documents by identifier, one per line ("-" for stdin)
    #[arg(long, conflicts_with = "mq")]
    ids: Option<String>,

    /// Run one query per line of this file, in parallel
    #[arg(long)]
    mq: Option<PathBuf>,

    /// Default operator for query strings
    #[arg(long, value_parser = parse_operator)]
    op: Option<Operator>,

    /// Send the query as a `q=` URL parameter instead of a JSON body
    #[arg(long)]
    uri_query: bool,

    /// Write one hit per line instead of one page per line
    #[arg(long)]
    hits: bool,

    /// Body read failures tolerated per scroll page
    #[arg(long)]
    max_retries: Option<u32>,

    /// Identifiers per lookup request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file path (default: ./esdump.toml or ~/.config/esdump/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_operator(s: &str) -> Result<Operator, String> {
    s.parse()
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let progress = Arc::new(esdump_core::ProgressContext::new());
    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    esdump_core::init_logging(cli.verbose, multi);

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    let settings = Settings::resolve(&cli, &config)?;

    // First signal requests a stop between pages, a second one exits
    let stop = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(sig, 130, Arc::clone(&stop))
            .context("Failed to register signal handler")?;
        signal_hook::flag::register(sig, Arc::clone(&stop))
            .context("Failed to register signal handler")?;
    }

    let transport =
        HttpTransport::new(settings.http.clone()).context("Failed to build HTTP client")?;
    let mut sink = modes::open_sink(cli.output.as_deref())?;

    if let Some(source) = &cli.ids {
        modes::ids(&transport, &settings, source, &mut sink, &progress)?;
        Ok(ExitCode::SUCCESS)
    } else if let Some(path) = &cli.mq {
        modes::multi_query(&transport, &settings, path, &mut sink, &progress)?;
        Ok(ExitCode::SUCCESS)
    } else {
        let query = modes::read_query(cli.query.as_deref(), cli.query_file.as_deref())?;
        let interrupted = modes::scroll(transport, &settings, &query, &mut sink, &stop, &progress)?;
        if interrupted {
            return Ok(ExitCode::from(130));
        }
        Ok(ExitCode::SUCCESS)
    }
}
