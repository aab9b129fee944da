//! Election event kinds and payload parsing.
//!
//! Payloads arrive as loosely-typed JSON. [`ElectionEvent::parse`] turns one
//! into a strongly-typed variant or an [`IndexerError::MalformedEvent`];
//! nothing downstream ever sees raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IndexerError;
use crate::types::RawEvent;

/// The five event kinds emitted by the election module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ElectionCreated,
    CandidateRegistered,
    VoterRegistered,
    VoteCast,
    ElectionEnded,
}

impl EventKind {
    /// Every kind, in registration order.
    pub const ALL: [EventKind; 5] = [
        Self::ElectionCreated,
        Self::CandidateRegistered,
        Self::VoterRegistered,
        Self::VoteCast,
        Self::ElectionEnded,
    ];

    /// Move struct name of the event (also the tracker id).
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ElectionCreated => "EventElectionCreated",
            Self::CandidateRegistered => "EventCandidateRegistered",
            Self::VoterRegistered => "EventVoterRegistered",
            Self::VoteCast => "EventVoteCast",
            Self::ElectionEnded => "EventElectionEnded",
        }
    }

    /// Reverse of [`event_name`](Self::event_name).
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.event_name() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_name())
    }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionCreated {
    pub election_id: String,
    pub name: String,
    pub creator: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRegistered {
    pub election_id: String,
    pub candidate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterRegistered {
    pub election_id: String,
    pub voter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCast {
    pub election_id: String,
    pub voter: String,
    pub candidate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionEnded {
    pub election_id: String,
    /// `None` when the election ended without a winner.
    pub winner: Option<String>,
    pub total_votes: u64,
}

/// A validated election event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionEvent {
    ElectionCreated(ElectionCreated),
    CandidateRegistered(CandidateRegistered),
    VoterRegistered(VoterRegistered),
    VoteCast(VoteCast),
    ElectionEnded(ElectionEnded),
}

impl ElectionEvent {
    /// Parse the payload of `raw` as an event of `kind`.
    pub fn parse(kind: EventKind, raw: &RawEvent) -> Result<Self, IndexerError> {
        let fields = Fields::new(kind, raw)?;
        Ok(match kind {
            EventKind::ElectionCreated => Self::ElectionCreated(ElectionCreated {
                election_id: fields.required("election_id")?,
                name: fields.required("name")?,
                creator: fields.required("creator")?,
            }),
            EventKind::CandidateRegistered => Self::CandidateRegistered(CandidateRegistered {
                election_id: fields.required("election_id")?,
                candidate: fields.required("candidate")?,
            }),
            EventKind::VoterRegistered => Self::VoterRegistered(VoterRegistered {
                election_id: fields.required("election_id")?,
                voter: fields.required("voter")?,
            }),
            EventKind::VoteCast => Self::VoteCast(VoteCast {
                election_id: fields.required("election_id")?,
                voter: fields.required("voter")?,
                candidate: fields.required("candidate")?,
            }),
            EventKind::ElectionEnded => Self::ElectionEnded(ElectionEnded {
                election_id: fields.required("election_id")?,
                winner: fields.optional_address("winner")?,
                total_votes: fields.count("total_votes")?,
            }),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::ElectionCreated(_) => EventKind::ElectionCreated,
            Self::CandidateRegistered(_) => EventKind::CandidateRegistered,
            Self::VoterRegistered(_) => EventKind::VoterRegistered,
            Self::VoteCast(_) => EventKind::VoteCast,
            Self::ElectionEnded(_) => EventKind::ElectionEnded,
        }
    }

    /// The election every event kind refers to.
    pub fn election_id(&self) -> &str {
        match self {
            Self::ElectionCreated(e) => &e.election_id,
            Self::CandidateRegistered(e) => &e.election_id,
            Self::VoterRegistered(e) => &e.election_id,
            Self::VoteCast(e) => &e.election_id,
            Self::ElectionEnded(e) => &e.election_id,
        }
    }
}

// ─── Field extraction ────────────────────────────────────────────────────────

struct Fields<'a> {
    kind: EventKind,
    tx_digest: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(kind: EventKind, raw: &'a RawEvent) -> Result<Self, IndexerError> {
        let reason = match raw.parsed_json.as_ref() {
            Some(Value::Object(map)) => {
                return Ok(Self {
                    kind,
                    tx_digest: raw.tx_digest(),
                    map,
                })
            }
            Some(_) => "parsedJson is not an object",
            None => "parsedJson is missing",
        };
        Err(IndexerError::malformed(kind.to_string(), raw.tx_digest(), reason))
    }

    fn malformed(&self, reason: String) -> IndexerError {
        IndexerError::malformed(self.kind.to_string(), self.tx_digest, reason)
    }

    fn unexpected(&self, field: &str, value: &Value) -> IndexerError {
        self.malformed(format!("field '{field}' has unexpected type: {value}"))
    }

    /// A required identifier or text field. Numbers are accepted and
    /// normalized to their decimal string; empty strings count as missing.
    fn required(&self, field: &str) -> Result<String, IndexerError> {
        match self.map.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                Err(self.malformed(format!("missing required field '{field}'")))
            }
            Some(other) => Err(self.unexpected(field, other)),
        }
    }

    /// A Move `Option<address>`: null, absent, a plain string, or the
    /// `{"vec": [...]}` encoding.
    fn optional_address(&self, field: &str) -> Result<Option<String>, IndexerError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Object(obj)) => match obj.get("vec").and_then(Value::as_array) {
                Some(items) if items.is_empty() => Ok(None),
                Some(items) => match &items[0] {
                    Value::String(s) if !s.is_empty() => Ok(Some(s.clone())),
                    other => Err(self.malformed(format!(
                        "field '{field}' has unexpected option value: {other}"
                    ))),
                },
                None => Err(self.malformed(format!("field '{field}' is not an option"))),
            },
            Some(other) => Err(self.unexpected(field, other)),
        }
    }

    /// A `u64` counter encoded as a decimal string or number. Absent = 0.
    fn count(&self, field: &str) -> Result<u64, IndexerError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| self.malformed(format!("field '{field}' is not a u64: {n}"))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| self.malformed(format!("field '{field}' is not a u64: {s:?}"))),
            Some(other) => Err(self.unexpected(field, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::EventCursor;
    use serde_json::json;

    fn raw(payload: Option<Value>) -> RawEvent {
        RawEvent {
            id: EventCursor::new("Dg1", "0"),
            package_id: "0x2a".into(),
            transaction_module: "vote".into(),
            sender: "0xA".into(),
            event_type: String::new(),
            parsed_json: payload,
            timestamp_ms: None,
        }
    }

    #[test]
    fn parse_election_created() {
        let ev = ElectionEvent::parse(
            EventKind::ElectionCreated,
            &raw(Some(json!({ "election_id": "e1", "name": "Board Vote", "creator": "0xA" }))),
        )
        .unwrap();
        assert_eq!(
            ev,
            ElectionEvent::ElectionCreated(ElectionCreated {
                election_id: "e1".into(),
                name: "Board Vote".into(),
                creator: "0xA".into(),
            })
        );
        assert_eq!(ev.election_id(), "e1");
        assert_eq!(ev.kind(), EventKind::ElectionCreated);
    }

    #[test]
    fn numeric_ids_are_normalized() {
        let ev = ElectionEvent::parse(
            EventKind::VoterRegistered,
            &raw(Some(json!({ "election_id": 7, "voter": "0xD", "extra": true }))),
        )
        .unwrap();
        assert_eq!(ev.election_id(), "7");
    }

    #[test]
    fn missing_payload_is_malformed() {
        let err = ElectionEvent::parse(EventKind::VoteCast, &raw(None)).unwrap_err();
        assert!(matches!(err, IndexerError::MalformedEvent { .. }));

        let err = ElectionEvent::parse(EventKind::VoteCast, &raw(Some(json!("oops")))).unwrap_err();
        assert!(matches!(err, IndexerError::MalformedEvent { .. }));
    }

    #[test]
    fn missing_or_empty_field_is_malformed() {
        let err = ElectionEvent::parse(
            EventKind::VoteCast,
            &raw(Some(json!({ "election_id": "e1", "voter": "0xD" }))),
        )
        .unwrap_err();
        assert!(err.to_string().contains("candidate"), "{err}");

        let err = ElectionEvent::parse(
            EventKind::CandidateRegistered,
            &raw(Some(json!({ "election_id": "", "candidate": "0xB" }))),
        )
        .unwrap_err();
        assert!(err.to_string().contains("election_id"), "{err}");
    }

    #[test]
    fn election_ended_winner_shapes() {
        let parse = |payload| {
            match ElectionEvent::parse(EventKind::ElectionEnded, &raw(Some(payload))) {
                Ok(ElectionEvent::ElectionEnded(e)) => e,
                other => panic!("unexpected: {other:?}"),
            }
        };

        let e = parse(json!({ "election_id": "e1", "winner": "0xB", "total_votes": "1" }));
        assert_eq!(e.winner.as_deref(), Some("0xB"));
        assert_eq!(e.total_votes, 1);

        let e = parse(json!({ "election_id": "e1", "winner": null, "total_votes": 0 }));
        assert_eq!(e.winner, None);

        let e = parse(json!({ "election_id": "e1", "winner": { "vec": [] } }));
        assert_eq!(e.winner, None);
        assert_eq!(e.total_votes, 0);

        let e = parse(json!({
            "election_id": "e1",
            "winner": { "vec": ["0xC"] },
            "total_votes": "12"
        }));
        assert_eq!(e.winner.as_deref(), Some("0xC"));
        assert_eq!(e.total_votes, 12);
    }

    #[test]
    fn election_ended_bad_total_is_malformed() {
        let err = ElectionEvent::parse(
            EventKind::ElectionEnded,
            &raw(Some(json!({ "election_id": "e1", "total_votes": "many" }))),
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::MalformedEvent { .. }));
    }

    #[test]
    fn event_names_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_event_name(kind.event_name()), Some(kind));
        }
        assert_eq!(EventKind::from_event_name("EventUnknown"), None);
    }
}
