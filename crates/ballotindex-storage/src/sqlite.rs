//! SQLite storage backend.
//!
//! Persists the election view and tracker cursors to a single SQLite file.
//! Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use ballotindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./ballots.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use ballotindex_core::checkpoint::{Checkpoint, CursorStore};
use ballotindex_core::cursor::EventCursor;
use ballotindex_core::error::IndexerError;
use ballotindex_core::model::{Candidate, Election, ElectionCounts, ElectionResult, Vote, Voter};
use ballotindex_core::store::ElectionStore;

use crate::sql::{created, from_millis, storage_err, to_millis};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS elections (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        election_id        TEXT    NOT NULL UNIQUE,
        name               TEXT    NOT NULL,
        creator_address    TEXT    NOT NULL,
        created_at         INTEGER NOT NULL,
        creation_tx_digest TEXT    NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS candidates (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        election_id       TEXT    NOT NULL REFERENCES elections (election_id),
        candidate_address TEXT    NOT NULL,
        tx_digest         TEXT    NOT NULL,
        created_at        INTEGER NOT NULL,
        UNIQUE (election_id, candidate_address)
    )",
    "CREATE TABLE IF NOT EXISTS voters (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        election_id   TEXT    NOT NULL REFERENCES elections (election_id),
        voter_address TEXT    NOT NULL,
        tx_digest     TEXT    NOT NULL,
        created_at    INTEGER NOT NULL,
        UNIQUE (election_id, voter_address)
    )",
    "CREATE TABLE IF NOT EXISTS votes (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        election_id       TEXT    NOT NULL REFERENCES elections (election_id),
        voter_address     TEXT    NOT NULL,
        candidate_address TEXT    NOT NULL,
        tx_digest         TEXT    NOT NULL,
        created_at        INTEGER NOT NULL,
        UNIQUE (election_id, voter_address)
    )",
    "CREATE INDEX IF NOT EXISTS idx_votes_candidate ON votes (election_id, candidate_address)",
    "CREATE TABLE IF NOT EXISTS election_results (
        election_id    TEXT    PRIMARY KEY REFERENCES elections (election_id),
        winner_address TEXT,
        total_votes    INTEGER NOT NULL,
        tx_digest      TEXT    NOT NULL,
        created_at     INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cursors (
        id         TEXT    PRIMARY KEY,
        tx_digest  TEXT    NOT NULL,
        event_seq  TEXT    NOT NULL,
        updated_at INTEGER NOT NULL
    )",
];

/// SQLite-backed election store and cursor store.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./ballots.db"`) or a full
    /// SQLite URL (`"sqlite:./ballots.db"`). `sqlite::memory:` is routed to
    /// [`in_memory`](Self::in_memory).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}")
        };
        if url.contains(":memory:") {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(storage_err)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options).await.map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Pinned to a single connection, since every connection to
    /// `sqlite::memory:` sees its own database. All data is lost when the
    /// pool is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await.map_err(storage_err)?;
        }
        debug!("sqlite schema initialized");
        Ok(())
    }
}

fn election_row(r: &SqliteRow) -> Result<Election, IndexerError> {
    Ok(Election {
        election_id: r.try_get("election_id").map_err(storage_err)?,
        name: r.try_get("name").map_err(storage_err)?,
        creator_address: r.try_get("creator_address").map_err(storage_err)?,
        created_at: from_millis(r.try_get("created_at").map_err(storage_err)?)?,
        creation_tx_digest: r.try_get("creation_tx_digest").map_err(storage_err)?,
    })
}

fn candidate_row(r: &SqliteRow) -> Result<Candidate, IndexerError> {
    Ok(Candidate {
        election_id: r.try_get("election_id").map_err(storage_err)?,
        candidate_address: r.try_get("candidate_address").map_err(storage_err)?,
        tx_digest: r.try_get("tx_digest").map_err(storage_err)?,
        created_at: from_millis(r.try_get("created_at").map_err(storage_err)?)?,
    })
}

fn voter_row(r: &SqliteRow) -> Result<Voter, IndexerError> {
    Ok(Voter {
        election_id: r.try_get("election_id").map_err(storage_err)?,
        voter_address: r.try_get("voter_address").map_err(storage_err)?,
        tx_digest: r.try_get("tx_digest").map_err(storage_err)?,
        created_at: from_millis(r.try_get("created_at").map_err(storage_err)?)?,
    })
}

fn vote_row(r: &SqliteRow) -> Result<Vote, IndexerError> {
    Ok(Vote {
        election_id: r.try_get("election_id").map_err(storage_err)?,
        voter_address: r.try_get("voter_address").map_err(storage_err)?,
        candidate_address: r.try_get("candidate_address").map_err(storage_err)?,
        tx_digest: r.try_get("tx_digest").map_err(storage_err)?,
        created_at: from_millis(r.try_get("created_at").map_err(storage_err)?)?,
    })
}

fn result_row(r: &SqliteRow) -> Result<ElectionResult, IndexerError> {
    Ok(ElectionResult {
        election_id: r.try_get("election_id").map_err(storage_err)?,
        winner_address: r.try_get("winner_address").map_err(storage_err)?,
        total_votes: r.try_get::<i64, _>("total_votes").map_err(storage_err)? as u64,
        tx_digest: r.try_get("tx_digest").map_err(storage_err)?,
        created_at: from_millis(r.try_get("created_at").map_err(storage_err)?)?,
    })
}

fn count(r: &SqliteRow, column: &str) -> Result<usize, IndexerError> {
    let n: i64 = r.try_get(column).map_err(storage_err)?;
    Ok(n.max(0) as usize)
}

fn checkpoint_row(r: &SqliteRow) -> Result<Checkpoint, IndexerError> {
    Ok(Checkpoint {
        tracker_id: r.try_get("id").map_err(storage_err)?,
        cursor: EventCursor {
            tx_digest: r.try_get("tx_digest").map_err(storage_err)?,
            event_seq: r.try_get("event_seq").map_err(storage_err)?,
        },
        updated_at: r.try_get("updated_at").map_err(storage_err)?,
    })
}

// ─── ElectionStore impl ──────────────────────────────────────────────────────

#[async_trait]
impl ElectionStore for SqliteStorage {
    async fn health_check(&self) -> Result<(), IndexerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(storage_err)?;
        Ok(())
    }

    async fn find_election(&self, election_id: &str) -> Result<Option<Election>, IndexerError> {
        let row = sqlx::query("SELECT * FROM elections WHERE election_id = ?")
            .bind(election_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(election_row).transpose()
    }

    async fn insert_election(&self, e: &Election) -> Result<bool, IndexerError> {
        let done = sqlx::query(
            "INSERT INTO elections
                 (election_id, name, creator_address, created_at, creation_tx_digest)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(&e.election_id)
        .bind(&e.name)
        .bind(&e.creator_address)
        .bind(to_millis(&e.created_at))
        .bind(&e.creation_tx_digest)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(created(done.rows_affected()))
    }

    async fn list_elections(&self) -> Result<Vec<Election>, IndexerError> {
        let rows = sqlx::query("SELECT * FROM elections ORDER BY created_at DESC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(election_row).collect()
    }

    async fn election_counts(&self, election_id: &str) -> Result<ElectionCounts, IndexerError> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM candidates WHERE election_id = ?1) AS candidates,
                (SELECT COUNT(*) FROM voters     WHERE election_id = ?1) AS voters,
                (SELECT COUNT(*) FROM votes      WHERE election_id = ?1) AS votes",
        )
        .bind(election_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(ElectionCounts {
            candidates: count(&row, "candidates")?,
            voters: count(&row, "voters")?,
            votes: count(&row, "votes")?,
        })
    }

    async fn insert_candidate(&self, c: &Candidate) -> Result<bool, IndexerError> {
        let done = sqlx::query(
            "INSERT INTO candidates (election_id, candidate_address, tx_digest, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(&c.election_id)
        .bind(&c.candidate_address)
        .bind(&c.tx_digest)
        .bind(to_millis(&c.created_at))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(created(done.rows_affected()))
    }

    async fn candidates(&self, election_id: &str) -> Result<Vec<Candidate>, IndexerError> {
        let rows = sqlx::query("SELECT * FROM candidates WHERE election_id = ? ORDER BY id")
            .bind(election_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(candidate_row).collect()
    }

    async fn insert_voter(&self, v: &Voter) -> Result<bool, IndexerError> {
        let done = sqlx::query(
            "INSERT INTO voters (election_id, voter_address, tx_digest, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(&v.election_id)
        .bind(&v.voter_address)
        .bind(&v.tx_digest)
        .bind(to_millis(&v.created_at))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(created(done.rows_affected()))
    }

    async fn voters(&self, election_id: &str) -> Result<Vec<Voter>, IndexerError> {
        let rows = sqlx::query("SELECT * FROM voters WHERE election_id = ? ORDER BY id")
            .bind(election_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(voter_row).collect()
    }

    async fn find_vote(
        &self,
        election_id: &str,
        voter_address: &str,
    ) -> Result<Option<Vote>, IndexerError> {
        let row = sqlx::query("SELECT * FROM votes WHERE election_id = ? AND voter_address = ?")
            .bind(election_id)
            .bind(voter_address)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(vote_row).transpose()
    }

    async fn insert_vote(&self, v: &Vote) -> Result<bool, IndexerError> {
        let done = sqlx::query(
            "INSERT INTO votes
                 (election_id, voter_address, candidate_address, tx_digest, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(&v.election_id)
        .bind(&v.voter_address)
        .bind(&v.candidate_address)
        .bind(&v.tx_digest)
        .bind(to_millis(&v.created_at))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(created(done.rows_affected()))
    }

    async fn votes(&self, election_id: &str) -> Result<Vec<Vote>, IndexerError> {
        let rows = sqlx::query(
            "SELECT * FROM votes WHERE election_id = ? ORDER BY created_at DESC, id ASC",
        )
        .bind(election_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(vote_row).collect()
    }

    async fn find_result(&self, election_id: &str) -> Result<Option<ElectionResult>, IndexerError> {
        let row = sqlx::query("SELECT * FROM election_results WHERE election_id = ?")
            .bind(election_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(result_row).transpose()
    }

    async fn insert_result(&self, r: &ElectionResult) -> Result<bool, IndexerError> {
        let done = sqlx::query(
            "INSERT INTO election_results
                 (election_id, winner_address, total_votes, tx_digest, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(&r.election_id)
        .bind(&r.winner_address)
        .bind(r.total_votes as i64)
        .bind(&r.tx_digest)
        .bind(to_millis(&r.created_at))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(created(done.rows_affected()))
    }
}

// ─── CursorStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl CursorStore for SqliteStorage {
    async fn load(&self, tracker_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT id, tx_digest, event_seq, updated_at FROM cursors WHERE id = ?",
        )
        .bind(tracker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(checkpoint_row).transpose()
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO cursors (id, tx_digest, event_seq, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                tx_digest  = excluded.tx_digest,
                event_seq  = excluded.event_seq,
                updated_at = excluded.updated_at",
        )
        .bind(&checkpoint.tracker_id)
        .bind(&checkpoint.cursor.tx_digest)
        .bind(&checkpoint.cursor.event_seq)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(tracker = %checkpoint.tracker_id, cursor = %checkpoint.cursor, "cursor saved");
        Ok(())
    }

    async fn delete(&self, tracker_id: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM cursors WHERE id = ?")
            .bind(tracker_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>, IndexerError> {
        let rows = sqlx::query(
            "SELECT id, tx_digest, event_seq, updated_at FROM cursors ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(checkpoint_row).collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
