use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{event_time, outcome, require_election};
use crate::error::IndexerError;
use crate::event::{ElectionEvent, EventKind};
use crate::handler::{unexpected_event, ApplyOutcome, EventHandler};
use crate::model::Candidate;
use crate::store::ElectionStore;
use crate::types::RawEvent;

/// Materializes `EventCandidateRegistered`.
pub struct CandidateRegisteredHandler {
    store: Arc<dyn ElectionStore>,
}

impl CandidateRegisteredHandler {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for CandidateRegisteredHandler {
    fn kind(&self) -> EventKind {
        EventKind::CandidateRegistered
    }

    async fn apply(
        &self,
        event: &ElectionEvent,
        raw: &RawEvent,
    ) -> Result<ApplyOutcome, IndexerError> {
        let ElectionEvent::CandidateRegistered(registered) = event else {
            return Err(unexpected_event(self.kind(), event));
        };

        require_election(self.store.as_ref(), &registered.election_id).await?;

        let candidate = Candidate {
            election_id: registered.election_id.clone(),
            candidate_address: registered.candidate.clone(),
            tx_digest: raw.tx_digest().to_string(),
            created_at: event_time(raw),
        };
        let inserted = self.store.insert_candidate(&candidate).await?;
        if inserted {
            info!(
                election_id = %candidate.election_id,
                candidate = %candidate.candidate_address,
                "candidate stored"
            );
        }
        Ok(outcome(inserted))
    }
}
