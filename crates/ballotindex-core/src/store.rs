//! The election store contract.
//!
//! Writes are insert-or-noop keyed by each row's natural unique key: an
//! `insert_*` call returns `true` when it created the row and `false` when a
//! row with the same key already existed (nothing is overwritten). Backends
//! must enforce the keys with a native unique constraint so that concurrent or
//! replayed inserts can never produce a second row.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::model::{Candidate, Election, ElectionCounts, ElectionResult, Vote, Voter};

#[async_trait]
pub trait ElectionStore: Send + Sync {
    /// Verify the store is reachable.
    async fn health_check(&self) -> Result<(), IndexerError>;

    // ─── Elections ───────────────────────────────────────────────────────────

    async fn find_election(&self, election_id: &str) -> Result<Option<Election>, IndexerError>;

    async fn insert_election(&self, election: &Election) -> Result<bool, IndexerError>;

    /// Every election, newest `created_at` first.
    async fn list_elections(&self) -> Result<Vec<Election>, IndexerError>;

    /// Candidate, voter and vote counts of one election, without loading rows.
    async fn election_counts(&self, election_id: &str) -> Result<ElectionCounts, IndexerError>;

    // ─── Candidates / voters ─────────────────────────────────────────────────

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<bool, IndexerError>;

    /// Candidates of an election in registration order.
    async fn candidates(&self, election_id: &str) -> Result<Vec<Candidate>, IndexerError>;

    async fn insert_voter(&self, voter: &Voter) -> Result<bool, IndexerError>;

    /// Voters of an election in registration order.
    async fn voters(&self, election_id: &str) -> Result<Vec<Voter>, IndexerError>;

    // ─── Votes ───────────────────────────────────────────────────────────────

    async fn find_vote(
        &self,
        election_id: &str,
        voter_address: &str,
    ) -> Result<Option<Vote>, IndexerError>;

    async fn insert_vote(&self, vote: &Vote) -> Result<bool, IndexerError>;

    /// Votes of an election, newest `created_at` first.
    async fn votes(&self, election_id: &str) -> Result<Vec<Vote>, IndexerError>;

    // ─── Results ─────────────────────────────────────────────────────────────

    async fn find_result(&self, election_id: &str) -> Result<Option<ElectionResult>, IndexerError>;

    async fn insert_result(&self, result: &ElectionResult) -> Result<bool, IndexerError>;
}
