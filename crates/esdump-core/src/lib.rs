//! esdump core - streaming documents out of a search cluster
//!
//! Three retrieval modes share one GET-only [`Transport`]:
//! scrolling through a query's full result set ([`Scroller`]), many
//! independent queries in parallel ([`run_queries`]), and lookups by
//! identifier ([`fetch_ids`]). Responses are forwarded to the sink as raw
//! bytes; only the fields needed for control flow are decoded.

pub mod dump;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod logging;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod retry;
pub mod scroll;
pub mod semaphore;
pub mod text;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use dump::{DumpOptions, DumpSummary, dump_scroll};
pub use envelope::{Envelope, HitsTotal};
pub use error::DumpError;
pub use ids::{IdConfig, IdSummary, fetch_ids};
pub use logging::init_logging;
pub use normalize::{Operator, normalize_query};
pub use progress::{ProgressContext, SharedProgress};
pub use query::{QueryConfig, QuerySummary, run_queries};
pub use scroll::{QueryPayload, ScrollConfig, Scroller};
pub use transport::{HttpConfig, HttpTransport, Request, StreamError, Transport};
