//! Retry helpers: exponential backoff for the transport, fixed delay for
//! truncated scroll bodies.

use std::time::Duration;

use crate::error::DumpError;
use crate::transport::StreamError;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Retry an operation while it fails with a body-read error.
///
/// `max_retries` bounds the number of failed attempts: after that many
/// body-read failures the result is [`DumpError::RetriesExhausted`] and
/// `attempt_fn` is not called again. Between failures the thread sleeps
/// `delay`. Any other failure is returned immediately as
/// [`DumpError::Transport`].
pub fn retry_body_reads<T>(
    label: &str,
    max_retries: u32,
    delay: Duration,
    mut attempt_fn: impl FnMut() -> Result<T, StreamError>,
) -> Result<T, DumpError> {
    let mut failures = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_body_read() => {
                failures += 1;
                if failures >= max_retries {
                    log::error!("{label}: giving up after {failures} failed attempts: {e}");
                    return Err(DumpError::RetriesExhausted {
                        attempts: failures,
                        last: e,
                    });
                }
                log::warn!("{label}: failed to read response body: {e}");
                log::warn!("{label}: retry {failures}/{max_retries} in {delay:?}");
                std::thread::sleep(delay);
            }
            Err(e) => {
                log::error!("{label}: failed permanently: {e}");
                return Err(DumpError::Transport(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn truncated() -> StreamError {
        StreamError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected EOF"))
    }

    #[test]
    fn backoff_exponential() {
        assert_eq!(backoff_duration(1), Duration::from_secs(2));
        assert_eq!(backoff_duration(2), Duration::from_secs(4));
        assert_eq!(backoff_duration(3), Duration::from_secs(8));
    }

    #[test]
    fn succeeds_after_failures_below_budget() {
        let mut calls = 0;
        let result = retry_body_reads("test", 3, Duration::ZERO, || {
            calls += 1;
            if calls <= 2 { Err(truncated()) } else { Ok(calls) }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_budget() {
        let mut calls = 0;
        let result: Result<(), _> = retry_body_reads("test", 3, Duration::ZERO, || {
            calls += 1;
            Err(truncated())
        });
        assert!(matches!(
            result,
            Err(DumpError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls, 3);
    }

    #[test]
    fn other_errors_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_body_reads("test", 5, Duration::ZERO, || {
            calls += 1;
            Err(StreamError::Http {
                status: Some(404),
                message: "missing".to_string(),
            })
        });
        assert!(matches!(result, Err(DumpError::Transport(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_budget_makes_one_attempt() {
        let mut calls = 0;
        let result: Result<(), _> = retry_body_reads("test", 0, Duration::ZERO, || {
            calls += 1;
            Err(truncated())
        });
        assert!(matches!(result, Err(DumpError::RetriesExhausted { .. })));
        assert_eq!(calls, 1);
    }
}
