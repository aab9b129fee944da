use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{event_time, outcome, require_election};
use crate::error::IndexerError;
use crate::event::{ElectionEvent, EventKind};
use crate::handler::{unexpected_event, ApplyOutcome, EventHandler};
use crate::model::Voter;
use crate::store::ElectionStore;
use crate::types::RawEvent;

/// Materializes `EventVoterRegistered`.
pub struct VoterRegisteredHandler {
    store: Arc<dyn ElectionStore>,
}

impl VoterRegisteredHandler {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for VoterRegisteredHandler {
    fn kind(&self) -> EventKind {
        EventKind::VoterRegistered
    }

    async fn apply(
        &self,
        event: &ElectionEvent,
        raw: &RawEvent,
    ) -> Result<ApplyOutcome, IndexerError> {
        let ElectionEvent::VoterRegistered(registered) = event else {
            return Err(unexpected_event(self.kind(), event));
        };

        require_election(self.store.as_ref(), &registered.election_id).await?;

        let voter = Voter {
            election_id: registered.election_id.clone(),
            voter_address: registered.voter.clone(),
            tx_digest: raw.tx_digest().to_string(),
            created_at: event_time(raw),
        };
        let inserted = self.store.insert_voter(&voter).await?;
        if inserted {
            info!(election_id = %voter.election_id, voter = %voter.voter_address, "voter stored");
        }
        Ok(outcome(inserted))
    }
}
