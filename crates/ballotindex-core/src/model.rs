//! Materialized rows derived from the election event stream.
//!
//! Every row is keyed by ledger-assigned identifiers and carries the digest of
//! the transaction that created it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub election_id: String,
    pub name: String,
    pub creator_address: String,
    pub created_at: DateTime<Utc>,
    pub creation_tx_digest: String,
}

/// Unique per `(election_id, candidate_address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub election_id: String,
    pub candidate_address: String,
    pub tx_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Unique per `(election_id, voter_address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub election_id: String,
    pub voter_address: String,
    pub tx_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Unique per `(election_id, voter_address)`: one vote per voter per election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub election_id: String,
    pub voter_address: String,
    pub candidate_address: String,
    pub tx_digest: String,
    pub created_at: DateTime<Utc>,
}

/// At most one per election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResult {
    pub election_id: String,
    /// `None` for a no-winner outcome.
    pub winner_address: Option<String>,
    pub total_votes: u64,
    pub tx_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Row counts of one election, as shown in listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElectionCounts {
    pub candidates: usize,
    pub voters: usize,
    pub votes: usize,
}
