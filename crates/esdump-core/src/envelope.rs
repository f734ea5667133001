//! Minimal view of a search response page.
//!
//! Only the fields needed for control flow are decoded; each hit stays an
//! opaque [`RawValue`] span borrowed from the response body.

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::DumpError;

/// Server-reported number of matching documents.
///
/// Older servers send a bare integer, newer ones an object with a relation
/// (`eq` for exact, `gte` when counting stopped early).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HitsTotal {
    Count(u64),
    Object {
        value: u64,
        #[serde(default)]
        relation: Relation,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    #[default]
    Eq,
    Gte,
}

impl HitsTotal {
    pub fn value(&self) -> u64 {
        match self {
            Self::Count(n) | Self::Object { value: n, .. } => *n,
        }
    }

    /// Whether the server vouches for the value as the exact total.
    pub fn is_exact(&self) -> bool {
        !matches!(
            self,
            Self::Object {
                relation: Relation::Gte,
                ..
            }
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct Hits<'a> {
    /// Absent or null when the query disables total tracking
    #[serde(default)]
    pub total: Option<HitsTotal>,
    #[serde(borrow)]
    pub hits: Vec<&'a RawValue>,
}

/// One decoded page.
#[derive(Debug, Deserialize)]
pub struct Envelope<'a> {
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,
    #[serde(borrow)]
    pub hits: Hits<'a>,
}

impl<'a> Envelope<'a> {
    /// Decode a page body; missing or malformed `hits` is a protocol error.
    pub fn parse(body: &'a [u8]) -> Result<Self, DumpError> {
        serde_json::from_slice(body)
            .map_err(|e| DumpError::Protocol(format!("invalid search response: {e}")))
    }

    /// Decode a scroll page, which must also carry a continuation token.
    pub fn parse_scroll(body: &'a [u8]) -> Result<(Self, String), DumpError> {
        let mut envelope = Self::parse(body)?;
        let scroll_id = envelope
            .scroll_id
            .take()
            .ok_or_else(|| DumpError::Protocol("response has no _scroll_id".to_string()))?;
        Ok((envelope, scroll_id))
    }

    pub fn hit_count(&self) -> usize {
        self.hits.hits.len()
    }

    /// Reported total; `None` when the server did not count.
    pub fn total(&self) -> Option<HitsTotal> {
        self.hits.total
    }
}
