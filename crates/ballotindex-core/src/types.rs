//! Shared types for the indexing pipeline.

use serde::{Deserialize, Serialize};

use crate::cursor::EventCursor;

// ─── EventFilter ─────────────────────────────────────────────────────────────

/// Server-side filter for an event query.
///
/// Serializes to the node's filter shape, e.g.
/// `{"MoveEventType": "0x2a::vote::EventVoteCast"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    /// Events of exactly this Move struct type.
    MoveEventType(String),
    /// Every event emitted by a module.
    MoveModule { package: String, module: String },
}

impl EventFilter {
    /// Filter for `<package>::<module>::<event_name>`.
    pub fn move_event(package: &str, module: &str, event_name: &str) -> Self {
        Self::MoveEventType(format!("{package}::{module}::{event_name}"))
    }
}

// ─── RawEvent ────────────────────────────────────────────────────────────────

/// An event as delivered by the node, before kind-specific parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Ledger position of the event.
    pub id: EventCursor,
    #[serde(default)]
    pub package_id: String,
    #[serde(default)]
    pub transaction_module: String,
    #[serde(default)]
    pub sender: String,
    /// Fully-qualified Move type of the event.
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Loosely-typed event payload; may be absent.
    #[serde(default)]
    pub parsed_json: Option<serde_json::Value>,
    /// Checkpoint timestamp in milliseconds, as a decimal string.
    #[serde(default)]
    pub timestamp_ms: Option<String>,
}

impl RawEvent {
    /// Transaction digest of the emitting transaction (provenance).
    pub fn tx_digest(&self) -> &str {
        &self.id.tx_digest
    }

    /// Event timestamp, if the node reported a parseable one.
    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let ms = self.timestamp_ms.as_deref()?.parse::<i64>().ok()?;
        chrono::DateTime::from_timestamp_millis(ms)
    }
}

// ─── EventPage ───────────────────────────────────────────────────────────────

/// One page of an ordered, filtered event query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub data: Vec<RawEvent>,
    #[serde(default)]
    pub next_cursor: Option<EventCursor>,
    #[serde(default)]
    pub has_next_page: bool,
}

impl EventPage {
    /// Position of the last event in the page.
    pub fn last_position(&self) -> Option<&EventCursor> {
        self.data.last().map(|e| &e.id)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_wire_shape() {
        let f = EventFilter::move_event("0x2a", "vote", "EventVoteCast");
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({ "MoveEventType": "0x2a::vote::EventVoteCast" })
        );

        let m = EventFilter::MoveModule {
            package: "0x2a".into(),
            module: "vote".into(),
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({ "MoveModule": { "package": "0x2a", "module": "vote" } })
        );
    }

    #[test]
    fn page_parses_node_response() {
        let page: EventPage = serde_json::from_value(json!({
            "data": [{
                "id": { "txDigest": "Dg1", "eventSeq": "0" },
                "packageId": "0x2a",
                "transactionModule": "vote",
                "sender": "0xA",
                "type": "0x2a::vote::EventElectionCreated",
                "parsedJson": { "election_id": "0xe1", "name": "Board Vote", "creator": "0xA" },
                "bcs": "ignored",
                "timestampMs": "1700000000000"
            }],
            "nextCursor": { "txDigest": "Dg1", "eventSeq": "0" },
            "hasNextPage": false
        }))
        .unwrap();

        assert_eq!(page.data.len(), 1);
        let ev = &page.data[0];
        assert_eq!(ev.tx_digest(), "Dg1");
        assert_eq!(ev.event_type, "0x2a::vote::EventElectionCreated");
        assert_eq!(ev.timestamp().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(page.last_position(), Some(&EventCursor::new("Dg1", "0")));
        assert!(!page.has_next_page);
    }

    #[test]
    fn missing_optional_fields_default() {
        let ev: RawEvent = serde_json::from_value(json!({
            "id": { "txDigest": "Dg2", "eventSeq": "1" }
        }))
        .unwrap();
        assert!(ev.parsed_json.is_none());
        assert!(ev.timestamp().is_none());
    }
}
