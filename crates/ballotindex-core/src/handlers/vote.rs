use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{event_time, outcome, require_election};
use crate::error::IndexerError;
use crate::event::{ElectionEvent, EventKind};
use crate::handler::{unexpected_event, ApplyOutcome, EventHandler};
use crate::model::Vote;
use crate::store::ElectionStore;
use crate::types::RawEvent;

/// Materializes `EventVoteCast`.
///
/// The store's unique key on `(election_id, voter_address)` is what prevents
/// double voting: the first applied vote wins and every later occurrence of
/// the pair, replayed or not, is a no-op.
pub struct VoteCastHandler {
    store: Arc<dyn ElectionStore>,
}

impl VoteCastHandler {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for VoteCastHandler {
    fn kind(&self) -> EventKind {
        EventKind::VoteCast
    }

    async fn apply(
        &self,
        event: &ElectionEvent,
        raw: &RawEvent,
    ) -> Result<ApplyOutcome, IndexerError> {
        let ElectionEvent::VoteCast(cast) = event else {
            return Err(unexpected_event(self.kind(), event));
        };

        require_election(self.store.as_ref(), &cast.election_id).await?;

        let vote = Vote {
            election_id: cast.election_id.clone(),
            voter_address: cast.voter.clone(),
            candidate_address: cast.candidate.clone(),
            tx_digest: raw.tx_digest().to_string(),
            created_at: event_time(raw),
        };
        let inserted = self.store.insert_vote(&vote).await?;
        if inserted {
            info!(
                election_id = %vote.election_id,
                voter = %vote.voter_address,
                candidate = %vote.candidate_address,
                "vote stored"
            );
        } else if let Some(existing) = self
            .store
            .find_vote(&vote.election_id, &vote.voter_address)
            .await?
        {
            if existing.candidate_address != vote.candidate_address {
                warn!(
                    election_id = %vote.election_id,
                    voter = %vote.voter_address,
                    kept = %existing.candidate_address,
                    ignored = %vote.candidate_address,
                    "second vote by the same voter ignored"
                );
            }
        }
        Ok(outcome(inserted))
    }
}
