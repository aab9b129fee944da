//! Handlers that materialize each election event kind.
//!
//! All of them follow the same shape: check the parent election (except for
//! `ElectionCreated`), then insert-or-noop on the row's natural key, recording
//! the originating transaction digest.

mod candidate;
mod election;
mod vote;
mod voter;

pub use candidate::CandidateRegisteredHandler;
pub use election::{ElectionCreatedHandler, ElectionEndedHandler};
pub use vote::VoteCastHandler;
pub use voter::VoterRegisteredHandler;

use chrono::{DateTime, Utc};

use crate::error::IndexerError;
use crate::handler::ApplyOutcome;
use crate::store::ElectionStore;
use crate::types::RawEvent;

/// Fails with [`IndexerError::MissingElection`] unless the election exists.
async fn require_election(
    store: &dyn ElectionStore,
    election_id: &str,
) -> Result<(), IndexerError> {
    match store.find_election(election_id).await? {
        Some(_) => Ok(()),
        None => Err(IndexerError::MissingElection {
            election_id: election_id.to_string(),
        }),
    }
}

/// Ledger timestamp of the event, falling back to ingestion time.
fn event_time(raw: &RawEvent) -> DateTime<Utc> {
    raw.timestamp().unwrap_or_else(Utc::now)
}

fn outcome(inserted: bool) -> ApplyOutcome {
    if inserted {
        ApplyOutcome::Applied
    } else {
        ApplyOutcome::Duplicate
    }
}
