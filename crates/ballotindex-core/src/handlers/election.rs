use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{event_time, outcome, require_election};
use crate::error::IndexerError;
use crate::event::{ElectionEvent, EventKind};
use crate::handler::{unexpected_event, ApplyOutcome, EventHandler};
use crate::model::{Election, ElectionResult};
use crate::store::ElectionStore;
use crate::types::RawEvent;

/// Materializes `EventElectionCreated`. Skips elections that already exist.
pub struct ElectionCreatedHandler {
    store: Arc<dyn ElectionStore>,
}

impl ElectionCreatedHandler {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for ElectionCreatedHandler {
    fn kind(&self) -> EventKind {
        EventKind::ElectionCreated
    }

    async fn apply(
        &self,
        event: &ElectionEvent,
        raw: &RawEvent,
    ) -> Result<ApplyOutcome, IndexerError> {
        let ElectionEvent::ElectionCreated(created) = event else {
            return Err(unexpected_event(self.kind(), event));
        };

        if self.store.find_election(&created.election_id).await?.is_some() {
            debug!(election_id = %created.election_id, "election already exists");
            return Ok(ApplyOutcome::Duplicate);
        }

        let election = Election {
            election_id: created.election_id.clone(),
            name: created.name.clone(),
            creator_address: created.creator.clone(),
            created_at: event_time(raw),
            creation_tx_digest: raw.tx_digest().to_string(),
        };
        let inserted = self.store.insert_election(&election).await?;
        if inserted {
            info!(election_id = %election.election_id, name = %election.name, "election stored");
        }
        Ok(outcome(inserted))
    }
}

/// Materializes `EventElectionEnded` into the result table. A result is
/// written once; later end events for the same election are no-ops.
pub struct ElectionEndedHandler {
    store: Arc<dyn ElectionStore>,
}

impl ElectionEndedHandler {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for ElectionEndedHandler {
    fn kind(&self) -> EventKind {
        EventKind::ElectionEnded
    }

    async fn apply(
        &self,
        event: &ElectionEvent,
        raw: &RawEvent,
    ) -> Result<ApplyOutcome, IndexerError> {
        let ElectionEvent::ElectionEnded(ended) = event else {
            return Err(unexpected_event(self.kind(), event));
        };

        require_election(self.store.as_ref(), &ended.election_id).await?;

        if self.store.find_result(&ended.election_id).await?.is_some() {
            debug!(election_id = %ended.election_id, "election result already exists");
            return Ok(ApplyOutcome::Duplicate);
        }

        let result = ElectionResult {
            election_id: ended.election_id.clone(),
            winner_address: ended.winner.clone(),
            total_votes: ended.total_votes,
            tx_digest: raw.tx_digest().to_string(),
            created_at: event_time(raw),
        };
        let inserted = self.store.insert_result(&result).await?;
        if inserted {
            info!(
                election_id = %result.election_id,
                winner = result.winner_address.as_deref().unwrap_or("none"),
                total_votes = result.total_votes,
                "election result stored"
            );
        }
        Ok(outcome(inserted))
    }
}
