//! ballotindex-storage: pluggable storage backends for BallotIndex.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - `sqlite`: SQLite via `sqlx` (embedded, single-file persistence)
//! - `postgres`: PostgreSQL via `sqlx` (production)
//!
//! Every backend implements both [`ElectionStore`] and [`CursorStore`];
//! [`connect`] picks one from a database URL.

use std::sync::Arc;

use ballotindex_core::checkpoint::CursorStore;
use ballotindex_core::error::IndexerError;
use ballotindex_core::store::ElectionStore;
use tracing::info;

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod sql;

pub use memory::InMemoryStore;

/// The two store handles the indexer needs, backed by the same database.
#[derive(Clone)]
pub struct Stores {
    pub backend: &'static str,
    pub elections: Arc<dyn ElectionStore>,
    pub cursors: Arc<dyn CursorStore>,
}

impl Stores {
    pub fn new<S>(backend: &'static str, store: Arc<S>) -> Self
    where
        S: ElectionStore + CursorStore + 'static,
    {
        Self {
            backend,
            elections: store.clone(),
            cursors: store,
        }
    }

    /// A fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new("memory", Arc::new(InMemoryStore::new()))
    }
}

/// Open the backend selected by the URL scheme: `memory:`, `sqlite:…`, or
/// `postgres://…` / `postgresql://…`.
pub async fn connect(database_url: &str) -> Result<Stores, IndexerError> {
    let stores = if database_url.starts_with("memory:") {
        Stores::in_memory()
    } else if database_url.starts_with("sqlite:") {
        open_sqlite(database_url).await?
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        open_postgres(database_url).await?
    } else {
        return Err(IndexerError::Config(format!(
            "unsupported DATABASE_URL scheme: {}",
            redact(database_url)
        )));
    };
    info!(backend = stores.backend, "store connected");
    Ok(stores)
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(url: &str) -> Result<Stores, IndexerError> {
    Ok(Stores::new("sqlite", Arc::new(sqlite::SqliteStorage::open(url).await?)))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_url: &str) -> Result<Stores, IndexerError> {
    Err(IndexerError::Config("built without the `sqlite` feature".into()))
}

#[cfg(feature = "postgres")]
async fn open_postgres(url: &str) -> Result<Stores, IndexerError> {
    Ok(Stores::new("postgres", Arc::new(postgres::PostgresStorage::connect(url).await?)))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_url: &str) -> Result<Stores, IndexerError> {
    Err(IndexerError::Config("built without the `postgres` feature".into()))
}

/// Scheme only, so credentials never reach logs.
fn redact(url: &str) -> &str {
    url.split_once(':').map_or(url, |(scheme, _)| scheme)
}
