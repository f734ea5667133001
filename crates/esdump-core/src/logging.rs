//! Logging to stderr, routed through indicatif when bars are visible
//!
//! Records are rendered as `[LEVEL] message`, or `[LEVEL module] message`
//! at debug level so scroll, query and transport lines can be told apart.

use std::fmt;

use indicatif::MultiProgress;
use log::Level;

/// Default filter: `warn` normally, `debug` for our crates with `--verbose`.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,esdump=debug,esdump_core=debug"
    } else {
        "warn"
    }
}

fn label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn ansi(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[32m",
        Level::Debug => "\x1b[36m",
        Level::Trace => "\x1b[35m",
    }
}

/// Last path segment of a log target: `esdump_core::scroll` -> `scroll`.
fn module(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// One log line without trailing newline.
fn render(level: Level, target: &str, args: &fmt::Arguments<'_>, color: bool) -> String {
    let tag = if level >= Level::Debug {
        format!("{} {}", label(level), module(target))
    } else {
        label(level).to_string()
    };
    if color {
        format!("[{}{tag}\x1b[0m] {args}", ansi(level))
    } else {
        format!("[{tag}] {args}")
    }
}

/// Prints through `MultiProgress` so log lines do not tear the spinner.
pub struct IndicatifLogger {
    filter: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(filter: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { filter, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.filter.matches(record) {
            return;
        }
        let line = render(record.level(), record.target(), record.args(), true);
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {}
}

/// Initialize logging. `RUST_LOG` overrides the default filter.
///
/// With `multi` (TTY mode) records are printed above the progress bars;
/// otherwise they are plain, timestamped lines for log collectors.
pub fn init_logging(verbose: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let env = env_logger::Env::default().default_filter_or(default_filter(verbose));

    match multi {
        Some(multi) => {
            let filter = env_logger::Builder::from_env(env).build();
            let max_level = filter.filter();
            if log::set_boxed_logger(Box::new(IndicatifLogger::new(filter, multi.clone()))).is_ok()
            {
                log::set_max_level(max_level);
            }
        }
        None => {
            let _ = env_logger::Builder::from_env(env)
                .format(|buf, record| {
                    let line = render(record.level(), record.target(), record.args(), false);
                    writeln!(buf, "{} {line}", buf.timestamp_millis())
                })
                .try_init();
        }
    }
}
