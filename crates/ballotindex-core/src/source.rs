//! The event source contract.

use async_trait::async_trait;

use crate::cursor::EventCursor;
use crate::error::IndexerError;
use crate::types::{EventFilter, EventPage};

/// A ledger node able to answer paged, filtered event queries.
///
/// Pages are returned in ascending ledger order. `after = None` starts at the
/// beginning of history; otherwise the page begins strictly after `after`.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn query_events(
        &self,
        filter: &EventFilter,
        after: Option<&EventCursor>,
        limit: usize,
    ) -> Result<EventPage, IndexerError>;

    /// Endpoint identifier for logs.
    fn endpoint(&self) -> &str;
}
