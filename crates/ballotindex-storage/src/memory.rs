//! In-memory storage backend.
//!
//! Holds the materialized election view and tracker cursors in RAM.
//! Useful for testing and short-lived indexers that don't need persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use ballotindex_core::checkpoint::{Checkpoint, CursorStore};
use ballotindex_core::error::IndexerError;
use ballotindex_core::model::{Candidate, Election, ElectionCounts, ElectionResult, Vote, Voter};
use ballotindex_core::store::ElectionStore;

#[derive(Default)]
struct Tables {
    /// Insertion order; `election_id` is unique.
    elections: Vec<Election>,
    candidates: Vec<Candidate>,
    voters: Vec<Voter>,
    votes: Vec<Vote>,
    results: HashMap<String, ElectionResult>,
}

/// In-memory election store and cursor store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    cursors: Mutex<BTreeMap<String, Checkpoint>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every operation fails with
    /// [`IndexerError::Storage`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, IndexerError> {
        self.check_online()?;
        self.tables
            .lock()
            .map_err(|_| IndexerError::Storage("election tables lock poisoned".into()))
    }

    fn cursors(&self) -> Result<MutexGuard<'_, BTreeMap<String, Checkpoint>>, IndexerError> {
        self.check_online()?;
        self.cursors
            .lock()
            .map_err(|_| IndexerError::Storage("cursor table lock poisoned".into()))
    }

    fn check_online(&self) -> Result<(), IndexerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(IndexerError::Storage("in-memory store is offline".into()));
        }
        Ok(())
    }
}

/// Copy of `rows`, newest `created_at` first; ties keep insertion order.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out = rows.to_vec();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

#[async_trait]
impl ElectionStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), IndexerError> {
        self.tables().map(|_| ())
    }

    async fn find_election(&self, election_id: &str) -> Result<Option<Election>, IndexerError> {
        Ok(self
            .tables()?
            .elections
            .iter()
            .find(|e| e.election_id == election_id)
            .cloned())
    }

    async fn insert_election(&self, election: &Election) -> Result<bool, IndexerError> {
        let mut tables = self.tables()?;
        if tables.elections.iter().any(|e| e.election_id == election.election_id) {
            return Ok(false);
        }
        tables.elections.push(election.clone());
        Ok(true)
    }

    async fn list_elections(&self) -> Result<Vec<Election>, IndexerError> {
        Ok(newest_first(&self.tables()?.elections, |e| e.created_at))
    }

    async fn election_counts(&self, election_id: &str) -> Result<ElectionCounts, IndexerError> {
        let tables = self.tables()?;
        Ok(ElectionCounts {
            candidates: tables
                .candidates
                .iter()
                .filter(|c| c.election_id == election_id)
                .count(),
            voters: tables.voters.iter().filter(|v| v.election_id == election_id).count(),
            votes: tables.votes.iter().filter(|v| v.election_id == election_id).count(),
        })
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<bool, IndexerError> {
        let mut tables = self.tables()?;
        let exists = tables.candidates.iter().any(|c| {
            c.election_id == candidate.election_id
                && c.candidate_address == candidate.candidate_address
        });
        if exists {
            return Ok(false);
        }
        tables.candidates.push(candidate.clone());
        Ok(true)
    }

    async fn candidates(&self, election_id: &str) -> Result<Vec<Candidate>, IndexerError> {
        Ok(self
            .tables()?
            .candidates
            .iter()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn insert_voter(&self, voter: &Voter) -> Result<bool, IndexerError> {
        let mut tables = self.tables()?;
        let exists = tables
            .voters
            .iter()
            .any(|v| v.election_id == voter.election_id && v.voter_address == voter.voter_address);
        if exists {
            return Ok(false);
        }
        tables.voters.push(voter.clone());
        Ok(true)
    }

    async fn voters(&self, election_id: &str) -> Result<Vec<Voter>, IndexerError> {
        Ok(self
            .tables()?
            .voters
            .iter()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn find_vote(
        &self,
        election_id: &str,
        voter_address: &str,
    ) -> Result<Option<Vote>, IndexerError> {
        Ok(self
            .tables()?
            .votes
            .iter()
            .find(|v| v.election_id == election_id && v.voter_address == voter_address)
            .cloned())
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<bool, IndexerError> {
        let mut tables = self.tables()?;
        let exists = tables
            .votes
            .iter()
            .any(|v| v.election_id == vote.election_id && v.voter_address == vote.voter_address);
        if exists {
            return Ok(false);
        }
        tables.votes.push(vote.clone());
        Ok(true)
    }

    async fn votes(&self, election_id: &str) -> Result<Vec<Vote>, IndexerError> {
        let tables = self.tables()?;
        let votes: Vec<Vote> = tables
            .votes
            .iter()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect();
        Ok(newest_first(&votes, |v| v.created_at))
    }

    async fn find_result(&self, election_id: &str) -> Result<Option<ElectionResult>, IndexerError> {
        Ok(self.tables()?.results.get(election_id).cloned())
    }

    async fn insert_result(&self, result: &ElectionResult) -> Result<bool, IndexerError> {
        let mut tables = self.tables()?;
        if tables.results.contains_key(&result.election_id) {
            return Ok(false);
        }
        tables.results.insert(result.election_id.clone(), result.clone());
        Ok(true)
    }
}

#[async_trait]
impl CursorStore for InMemoryStore {
    async fn load(&self, tracker_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.cursors()?.get(tracker_id).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.cursors()?.insert(checkpoint.tracker_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, tracker_id: &str) -> Result<(), IndexerError> {
        self.cursors()?.remove(tracker_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>, IndexerError> {
        Ok(self.cursors()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotindex_core::cursor::EventCursor;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn election(id: &str, secs: i64) -> Election {
        Election {
            election_id: id.into(),
            name: format!("Election {id}"),
            creator_address: "0xA".into(),
            created_at: at(secs),
            creation_tx_digest: format!("Dg-{id}"),
        }
    }

    #[tokio::test]
    async fn insert_is_noop_on_duplicate_key() {
        let store = InMemoryStore::new();
        assert!(store.insert_election(&election("e1", 1)).await.unwrap());

        let mut renamed = election("e1", 2);
        renamed.name = "Renamed".into();
        assert!(!store.insert_election(&renamed).await.unwrap());
        assert_eq!(store.find_election("e1").await.unwrap().unwrap().name, "Election e1");
    }

    #[tokio::test]
    async fn elections_listed_newest_first() {
        let store = InMemoryStore::new();
        store.insert_election(&election("old", 10)).await.unwrap();
        store.insert_election(&election("new", 20)).await.unwrap();

        let ids: Vec<_> = store
            .list_elections()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.election_id)
            .collect();
        assert_eq!(ids, ["new", "old"]);
    }

    #[tokio::test]
    async fn one_vote_per_voter_per_election() {
        let store = InMemoryStore::new();
        let vote = |candidate: &str, election: &str| Vote {
            election_id: election.into(),
            voter_address: "0xD".into(),
            candidate_address: candidate.into(),
            tx_digest: "Dg".into(),
            created_at: at(5),
        };

        assert!(store.insert_vote(&vote("0xB", "e1")).await.unwrap());
        assert!(!store.insert_vote(&vote("0xC", "e1")).await.unwrap());
        assert!(store.insert_vote(&vote("0xC", "e2")).await.unwrap());

        let kept = store.find_vote("e1", "0xD").await.unwrap().unwrap();
        assert_eq!(kept.candidate_address, "0xB");
    }

    #[tokio::test]
    async fn counts_only_the_given_election() {
        let store = InMemoryStore::new();
        let vote = |voter: &str, election: &str| Vote {
            election_id: election.into(),
            voter_address: voter.into(),
            candidate_address: "0xB".into(),
            tx_digest: "Dg".into(),
            created_at: at(5),
        };
        store.insert_vote(&vote("0xD", "e1")).await.unwrap();
        store.insert_vote(&vote("0xE", "e1")).await.unwrap();
        store.insert_vote(&vote("0xD", "e2")).await.unwrap();

        let counts = store.election_counts("e1").await.unwrap();
        assert_eq!(counts.votes, 2);
        assert_eq!(counts.candidates, 0);
        assert_eq!(store.election_counts("e2").await.unwrap().votes, 1);
    }

    #[tokio::test]
    async fn offline_store_fails_everything() {
        let store = InMemoryStore::new();
        store.set_offline(true);

        assert!(matches!(store.health_check().await, Err(IndexerError::Storage(_))));
        assert!(store.insert_election(&election("e1", 1)).await.is_err());
        assert!(CursorStore::load(&store, "EventVoteCast").await.is_err());

        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn cursor_rows_upsert() {
        let store = InMemoryStore::new();
        let cp = |digest: &str| Checkpoint {
            tracker_id: "EventVoteCast".into(),
            cursor: EventCursor::new(digest, "0"),
            updated_at: 0,
        };

        store.save(cp("A")).await.unwrap();
        store.save(cp("B")).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].cursor.tx_digest, "B");
    }
}
