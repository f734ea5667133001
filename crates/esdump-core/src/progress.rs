//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: a spinner line while scrolling, a counted bar for query batches.
//! Non-TTY mode: hidden bars; log lines are the only progress indicator.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::envelope::HitsTotal;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<8.cyan.bold} {wide_msg}")
        .expect("invalid template")
}

fn count_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<8.cyan.bold} {bar:30.green/dim} {pos:>7}/{len:7} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Central progress context.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Spinner for a scroll; update it with [`show_scroll`].
    pub fn scroll_line(&self, index: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(spinner_style());
        pb.set_prefix(index.to_string());
        pb.set_message("starting scroll...");
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Counted bar over `total` queries or batches.
    pub fn count_bar(&self, label: &str, total: u64) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(count_style());
        pb.set_prefix(label.to_string());
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Render scroll progress, e.g. `fetched 2,000 / 2,500 (80.0%)`.
pub fn scroll_message(fetched: u64, reported: Option<HitsTotal>) -> String {
    match reported {
        Some(total) if total.value() > 0 => {
            let bound = if total.is_exact() { "" } else { ">=" };
            format!(
                "fetched {} / {bound}{} ({:.1}%)",
                fmt_num(fetched),
                fmt_num(total.value()),
                fetched as f64 / total.value() as f64 * 100.0
            )
        }
        _ => format!("fetched {}", fmt_num(fetched)),
    }
}

pub fn show_scroll(pb: &ProgressBar, fetched: u64, reported: Option<HitsTotal>) {
    pb.set_message(scroll_message(fetched, reported));
}

/// Format number with thousand separators.
pub fn fmt_num(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Relation;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(12), "12");
        assert_eq!(fmt_num(123), "123");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(123_456), "123,456");
        assert_eq!(fmt_num(1_234_567_890), "1,234,567,890");
    }

    #[test]
    fn scroll_message_exact_total() {
        assert_eq!(
            scroll_message(2_000, Some(HitsTotal::Count(2_500))),
            "fetched 2,000 / 2,500 (80.0%)"
        );
    }

    #[test]
    fn scroll_message_lower_bound() {
        let total = HitsTotal::Object {
            value: 10_000,
            relation: Relation::Gte,
        };
        assert_eq!(
            scroll_message(5_000, Some(total)),
            "fetched 5,000 / >=10,000 (50.0%)"
        );
    }

    #[test]
    fn scroll_message_unknown_total() {
        assert_eq!(scroll_message(7, None), "fetched 7");
        assert_eq!(scroll_message(0, Some(HitsTotal::Count(0))), "fetched 0");
    }

    #[test]
    fn hidden_bars_outside_tty() {
        let ctx = ProgressContext {
            multi: MultiProgress::new(),
            is_tty: false,
        };
        assert!(ctx.scroll_line("docs").is_hidden());
        assert!(ctx.count_bar("queries", 3).is_hidden());
    }
}
