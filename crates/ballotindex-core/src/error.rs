//! Error types for the ballotindex pipeline.

use thiserror::Error;

/// Errors that can occur during indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed {kind} event in tx {tx_digest}: {reason}")]
    MalformedEvent {
        kind: String,
        tx_digest: String,
        reason: String,
    },

    #[error("Election {election_id} is not materialized yet")]
    MissingElection { election_id: String },

    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IndexerError {
    /// Returns `true` if the error affects the whole page rather than a single
    /// event. Batch-level errors abort the cycle before the cursor advances.
    pub fn is_batch_level(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Storage(_))
    }

    pub(crate) fn malformed(
        kind: impl Into<String>,
        tx_digest: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedEvent {
            kind: kind.into(),
            tx_digest: tx_digest.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_level_classification() {
        assert!(IndexerError::Storage("pool closed".into()).is_batch_level());
        assert!(IndexerError::Rpc("timeout".into()).is_batch_level());
        let missing = IndexerError::MissingElection {
            election_id: "0x1".into(),
        };
        assert!(!missing.is_batch_level());
        assert!(!IndexerError::malformed("VoteCast", "Dg1", "missing voter").is_batch_level());
        assert!(!IndexerError::Config("PAGE_SIZE must be 1-50".into()).is_batch_level());
    }
}
