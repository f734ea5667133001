//! Error type shared by the scroller, the query runner and identifier lookup

use crate::transport::StreamError;

/// Terminal failure of a dump operation.
///
/// Only [`StreamError::Io`] during a scroll continuation is ever retried, and
/// exhausting that budget yields [`DumpError::RetriesExhausted`]. Everything
/// else is final on first occurrence.
#[derive(Debug)]
pub enum DumpError {
    /// Request failed at the transport (connection, status, body read)
    Transport(StreamError),
    /// Response did not have the expected shape, or a request could not be encoded
    Protocol(String),
    /// Body reads kept failing during a scroll continuation
    RetriesExhausted { attempts: u32, last: StreamError },
    /// Writing to the output sink failed
    Sink(std::io::Error),
    /// Reading caller-supplied input (identifier list) failed
    Input(std::io::Error),
}

impl std::fmt::Display for DumpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "max retries exceeded ({attempts} attempts): {last}")
            }
            Self::Sink(e) => write!(f, "sink: {e}"),
            Self::Input(e) => write!(f, "input: {e}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) | Self::RetriesExhausted { last: e, .. } => Some(e),
            Self::Protocol(_) => None,
            Self::Sink(e) | Self::Input(e) => Some(e),
        }
    }
}

impl From<StreamError> for DumpError {
    fn from(e: StreamError) -> Self {
        Self::Transport(e)
    }
}

impl From<serde_json::Error> for DumpError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl DumpError {
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
