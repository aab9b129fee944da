//! Read API over the materialized election view.
//!
//! Every response type serializes with camelCase field names. Store failures
//! surface as a [`QueryError`] carrying only a generic message; the
//! underlying cause is logged and kept as the error source.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::error::IndexerError;
use crate::model::{Election, Vote};
use crate::store::ElectionStore;

/// A read-side failure with a client-safe message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct QueryError {
    message: &'static str,
    #[source]
    source: IndexerError,
}

impl QueryError {
    pub fn message(&self) -> &'static str {
        self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub election_id: String,
    pub name: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub candidate_count: usize,
    pub voter_count: usize,
    pub vote_count: usize,
    pub has_ended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDetail {
    pub election_id: String,
    pub name: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub candidates: Vec<String>,
    pub voters: Vec<String>,
    pub vote_count: usize,
    pub has_ended: bool,
    pub result: Option<ResultSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub winner: Option<String>,
    pub total_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally {
    pub candidate_address: String,
    pub vote_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterStatus {
    pub voter_address: String,
    pub has_voted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub voter_address: String,
    pub candidate_address: String,
    pub tx_digest: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateShare {
    pub candidate_address: String,
    pub vote_count: usize,
    /// Share of `total_votes`, two decimals (`"0.00"` when nobody voted).
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub election_id: String,
    pub has_ended: bool,
    pub winner: Option<String>,
    /// Number of materialized votes (not the count reported by the end event).
    pub total_votes: usize,
    /// Ordered by vote count, highest first.
    pub candidates: Vec<CandidateShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Query facade over an [`ElectionStore`].
#[derive(Clone)]
pub struct ElectionQueries {
    store: Arc<dyn ElectionStore>,
}

impl ElectionQueries {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }

    /// Every election, newest first, with row counts.
    pub async fn list_elections(&self) -> Result<Vec<ElectionSummary>, QueryError> {
        const MSG: &str = "Failed to fetch elections";
        let elections = self.store.list_elections().await.map_err(fail(MSG))?;

        let mut out = Vec::with_capacity(elections.len());
        for election in elections {
            let id = election.election_id.as_str();
            let counts = self.store.election_counts(id).await.map_err(fail(MSG))?;
            let has_ended = self.store.find_result(id).await.map_err(fail(MSG))?.is_some();
            out.push(ElectionSummary {
                election_id: election.election_id,
                name: election.name,
                creator: election.creator_address,
                created_at: election.created_at,
                candidate_count: counts.candidates,
                voter_count: counts.voters,
                vote_count: counts.votes,
                has_ended,
            });
        }
        Ok(out)
    }

    /// `Ok(None)` when the election is unknown.
    pub async fn election(&self, election_id: &str) -> Result<Option<ElectionDetail>, QueryError> {
        const MSG: &str = "Failed to fetch election";
        let Some(Election {
            election_id,
            name,
            creator_address,
            created_at,
            ..
        }) = self.store.find_election(election_id).await.map_err(fail(MSG))?
        else {
            return Ok(None);
        };

        let candidates = self.store.candidates(&election_id).await.map_err(fail(MSG))?;
        let voters = self.store.voters(&election_id).await.map_err(fail(MSG))?;
        let counts = self.store.election_counts(&election_id).await.map_err(fail(MSG))?;
        let result = self.store.find_result(&election_id).await.map_err(fail(MSG))?;

        Ok(Some(ElectionDetail {
            election_id,
            name,
            creator: creator_address,
            created_at,
            candidates: candidates.into_iter().map(|c| c.candidate_address).collect(),
            voters: voters.into_iter().map(|v| v.voter_address).collect(),
            vote_count: counts.votes,
            has_ended: result.is_some(),
            result: result.map(|r| ResultSummary {
                winner: r.winner_address,
                total_votes: r.total_votes,
            }),
        }))
    }

    /// Candidates in registration order with their vote counts.
    pub async fn candidates(&self, election_id: &str) -> Result<Vec<CandidateTally>, QueryError> {
        const MSG: &str = "Failed to fetch candidates";
        let candidates = self.store.candidates(election_id).await.map_err(fail(MSG))?;
        let votes = self.store.votes(election_id).await.map_err(fail(MSG))?;

        Ok(candidates
            .into_iter()
            .map(|c| CandidateTally {
                vote_count: votes_for(&votes, &c.candidate_address),
                candidate_address: c.candidate_address,
            })
            .collect())
    }

    pub async fn voters(&self, election_id: &str) -> Result<Vec<VoterStatus>, QueryError> {
        const MSG: &str = "Failed to fetch voters";
        let voters = self.store.voters(election_id).await.map_err(fail(MSG))?;
        let votes = self.store.votes(election_id).await.map_err(fail(MSG))?;

        Ok(voters
            .into_iter()
            .map(|v| VoterStatus {
                has_voted: votes.iter().any(|vote| vote.voter_address == v.voter_address),
                voter_address: v.voter_address,
            })
            .collect())
    }

    /// Votes, newest first.
    pub async fn votes(&self, election_id: &str) -> Result<Vec<VoteRecord>, QueryError> {
        let votes = self
            .store
            .votes(election_id)
            .await
            .map_err(fail("Failed to fetch votes"))?;

        Ok(votes
            .into_iter()
            .map(|v| VoteRecord {
                voter_address: v.voter_address,
                candidate_address: v.candidate_address,
                tx_digest: v.tx_digest,
                created_at: v.created_at,
            })
            .collect())
    }

    pub async fn results(&self, election_id: &str) -> Result<ElectionResults, QueryError> {
        const MSG: &str = "Failed to fetch results";
        let candidates = self.store.candidates(election_id).await.map_err(fail(MSG))?;
        let votes = self.store.votes(election_id).await.map_err(fail(MSG))?;
        let result = self.store.find_result(election_id).await.map_err(fail(MSG))?;

        let total_votes = votes.len();
        let mut shares: Vec<CandidateShare> = candidates
            .into_iter()
            .map(|c| {
                let vote_count = votes_for(&votes, &c.candidate_address);
                CandidateShare {
                    candidate_address: c.candidate_address,
                    vote_count,
                    percentage: percentage(vote_count, total_votes),
                }
            })
            .collect();
        // Stable: ties keep registration order
        shares.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

        Ok(ElectionResults {
            election_id: election_id.to_string(),
            has_ended: result.is_some(),
            winner: result.and_then(|r| r.winner_address),
            total_votes,
            candidates: shares,
        })
    }

    /// Store reachability. Never fails; an unreachable store is reported in
    /// the body.
    pub async fn health(&self) -> HealthReport {
        match self.store.health_check().await {
            Ok(()) => HealthReport {
                status: "healthy",
                timestamp: Utc::now(),
                database: "connected",
                error: None,
            },
            Err(e) => {
                error!(error = %e, "health check failed");
                HealthReport {
                    status: "unhealthy",
                    timestamp: Utc::now(),
                    database: "disconnected",
                    error: Some("Database connection failed"),
                }
            }
        }
    }
}

fn fail(message: &'static str) -> impl Fn(IndexerError) -> QueryError {
    move |source| {
        error!(error = %source, "{message}");
        QueryError { message, source }
    }
}

fn votes_for(votes: &[Vote], candidate_address: &str) -> usize {
    votes
        .iter()
        .filter(|v| v.candidate_address == candidate_address)
        .count()
}

/// `count / total` as a percentage with two decimals, halves rounded up.
fn percentage(count: usize, total: usize) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    let (count, total) = (count as u64, total as u64);
    let hundredths = (count * 20_000 + total) / (2 * total);
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}
