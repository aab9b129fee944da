//! Event cursor: a tracker's position in the ledger's event stream.

use serde::{Deserialize, Serialize};

/// Position of a single event on the ledger.
///
/// A transaction digest plus the event's sequence number inside that
/// transaction. The pair is opaque to the indexer: it is only ever handed
/// back to the event source to resume a query strictly after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCursor {
    pub tx_digest: String,
    pub event_seq: String,
}

impl EventCursor {
    pub fn new(tx_digest: impl Into<String>, event_seq: impl Into<String>) -> Self {
        Self {
            tx_digest: tx_digest.into(),
            event_seq: event_seq.into(),
        }
    }
}

impl std::fmt::Display for EventCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.tx_digest, self.event_seq)
    }
}
