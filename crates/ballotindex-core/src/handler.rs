//! Event handler trait and per-batch application.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::IndexerError;
use crate::event::{ElectionEvent, EventKind};
use crate::types::RawEvent;

/// What applying a single event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new row was created.
    Applied,
    /// The row already existed; redelivery is a no-op.
    Duplicate,
}

/// Per-page tally returned by [`EventHandler::handle_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub applied: usize,
    pub duplicates: usize,
    /// Malformed events and events whose election is not materialized.
    pub skipped: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.applied + self.duplicates + self.skipped
    }
}

/// Applies one event kind to the materialized view.
///
/// Implementors only provide [`apply`](Self::apply); the provided
/// [`handle_batch`](Self::handle_batch) parses each raw event, skips the ones
/// that are malformed or whose parent election is missing, and stops at the
/// first batch-level (store / transport) failure so the caller can retry the
/// page without advancing its cursor.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The event kind this handler processes.
    fn kind(&self) -> EventKind;

    /// Apply one validated event idempotently.
    async fn apply(
        &self,
        event: &ElectionEvent,
        raw: &RawEvent,
    ) -> Result<ApplyOutcome, IndexerError>;

    /// Apply an ordered page of raw events, in order.
    async fn handle_batch(&self, events: &[RawEvent]) -> Result<BatchReport, IndexerError> {
        let kind = self.kind();
        let mut report = BatchReport::default();

        for raw in events {
            let event = match ElectionEvent::parse(kind, raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        tracker = %kind,
                        position = %raw.id,
                        error = %e,
                        "skipping malformed event"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            match self.apply(&event, raw).await {
                Ok(ApplyOutcome::Applied) => report.applied += 1,
                Ok(ApplyOutcome::Duplicate) => {
                    debug!(tracker = %kind, position = %raw.id, "duplicate event, already applied");
                    report.duplicates += 1;
                }
                Err(e) if e.is_batch_level() => return Err(e),
                Err(e) => {
                    warn!(
                        tracker = %kind,
                        position = %raw.id,
                        election_id = %event.election_id(),
                        error = %e,
                        "skipping event"
                    );
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Error for a handler fed an event of the wrong kind.
pub(crate) fn unexpected_event(handler: EventKind, event: &ElectionEvent) -> IndexerError {
    IndexerError::Handler {
        handler: handler.to_string(),
        reason: format!("received {} event", event.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::EventCursor;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Counts applied votes; fails with a storage error on voter `0xFAIL`.
    struct Counter(Arc<AtomicU32>);

    #[async_trait]
    impl EventHandler for Counter {
        fn kind(&self) -> EventKind {
            EventKind::VoteCast
        }

        async fn apply(
            &self,
            event: &ElectionEvent,
            _raw: &RawEvent,
        ) -> Result<ApplyOutcome, IndexerError> {
            match event {
                ElectionEvent::VoteCast(v) if v.voter == "0xFAIL" => {
                    Err(IndexerError::Storage("connection reset".into()))
                }
                ElectionEvent::VoteCast(v) if v.election_id == "missing" => {
                    Err(IndexerError::MissingElection {
                        election_id: v.election_id.clone(),
                    })
                }
                ElectionEvent::VoteCast(_) => {
                    self.0.fetch_add(1, Ordering::Relaxed);
                    Ok(ApplyOutcome::Applied)
                }
                other => Err(unexpected_event(self.kind(), other)),
            }
        }
    }

    fn vote(seq: u32, election: &str, voter: &str) -> RawEvent {
        RawEvent {
            id: EventCursor::new("Dg", seq.to_string()),
            package_id: String::new(),
            transaction_module: String::new(),
            sender: String::new(),
            event_type: String::new(),
            parsed_json: Some(serde_json::json!({
                "election_id": election, "voter": voter, "candidate": "0xB"
            })),
            timestamp_ms: None,
        }
    }

    #[tokio::test]
    async fn per_event_failures_do_not_abort_batch() {
        let count = Arc::new(AtomicU32::new(0));
        let handler = Counter(count.clone());

        let mut malformed = vote(1, "e1", "0xD");
        malformed.parsed_json = None;

        let events = vec![
            vote(0, "e1", "0xD"),
            malformed,
            vote(2, "missing", "0xE"),
            vote(3, "e1", "0xF"),
        ];
        let report = handler.handle_batch(&events).await.unwrap();

        let tally = (report.applied, report.duplicates, report.skipped);
        assert_eq!(tally, (2, 0, 2));
        assert_eq!(report.total(), 4);
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn batch_level_failure_aborts() {
        let count = Arc::new(AtomicU32::new(0));
        let handler = Counter(count.clone());

        let events = vec![vote(0, "e1", "0xD"), vote(1, "e1", "0xFAIL"), vote(2, "e1", "0xF")];
        let err = handler.handle_batch(&events).await.unwrap_err();

        assert!(err.is_batch_level());
        // The event after the failure was never attempted
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
