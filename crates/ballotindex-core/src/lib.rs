//! ballotindex-core: the engine behind the Sui election indexer.
//!
//! # Architecture
//!
//! ```text
//! Indexer ── one TrackerLoop task per event kind
//!              ├── EventSource      (paged, filtered event queries)
//!              ├── EventHandler     (idempotent apply into the ElectionStore)
//!              └── CursorManager    (resume position, saved after apply)
//!
//! ElectionQueries ── read API over the materialized ElectionStore
//! ```
//!
//! Backends live in `ballotindex-storage`; the Sui JSON-RPC source lives in
//! `ballotindex-sui`.

pub mod checkpoint;
pub mod cursor;
pub mod error;
pub mod event;
pub mod handler;
pub mod handlers;
pub mod indexer;
pub mod model;
pub mod poller;
pub mod query;
pub mod registry;
pub mod source;
pub mod store;
pub mod types;

pub use checkpoint::{Checkpoint, CursorManager, CursorStore, MemoryCursorStore};
pub use cursor::EventCursor;
pub use error::IndexerError;
pub use event::{ElectionEvent, EventKind};
pub use handler::{ApplyOutcome, BatchReport, EventHandler};
pub use indexer::{fullnode_url, IndexerConfig, TrackerState, MAX_PAGE_SIZE};
pub use model::{Candidate, Election, ElectionCounts, ElectionResult, Vote, Voter};
pub use poller::{CycleOutcome, Indexer, IndexerHandle, TrackerLoop};
pub use query::{ElectionQueries, QueryError};
pub use registry::{Tracker, TrackerRegistry};
pub use source::EventSource;
pub use store::ElectionStore;
pub use types::{EventFilter, EventPage, RawEvent};
