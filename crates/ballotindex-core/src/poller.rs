//! Polling scheduler: one resumable loop per tracker.
//!
//! # Cycle
//! ```text
//! Idle(cursor) → Fetching → Applying → Persisting → Idle(last event of page)
//!      ↑             │           │            │
//!      └─────────────┴── error ──┴────────────┘  (cursor unchanged)
//! ```
//!
//! The cursor is saved only after the handler accepted the whole page, so a
//! crash or store outage between apply and persist replays the page, which
//! the idempotent handlers absorb. A loop re-polls immediately while the node
//! reports more pages and sleeps `poll_interval` otherwise or after a failure.
//!
//! Shutdown is observed while fetching or sleeping, never between apply and
//! persist.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{CursorManager, CursorStore};
use crate::cursor::EventCursor;
use crate::error::IndexerError;
use crate::handler::BatchReport;
use crate::indexer::{IndexerConfig, TrackerState};
use crate::registry::{Tracker, TrackerRegistry};
use crate::source::EventSource;
use crate::types::EventPage;

/// Result of one successful poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Events in the fetched page.
    pub events: usize,
    pub report: BatchReport,
    /// The node reported further pages after this one.
    pub has_more: bool,
}

/// The polling loop of a single tracker.
pub struct TrackerLoop {
    tracker: Tracker,
    source: Arc<dyn EventSource>,
    cursors: CursorManager,
    page_size: usize,
    poll_interval: Duration,
    cursor: Option<EventCursor>,
    state: TrackerState,
}

impl TrackerLoop {
    /// Build a loop for `tracker`, resuming from its persisted cursor.
    pub async fn resume(
        tracker: Tracker,
        source: Arc<dyn EventSource>,
        store: Arc<dyn CursorStore>,
        page_size: usize,
        poll_interval: Duration,
    ) -> Result<Self, IndexerError> {
        let cursors = CursorManager::new(store, tracker.id());
        let cursor = cursors.load().await?;
        match &cursor {
            Some(c) => info!(tracker = tracker.id(), cursor = %c, "resuming from saved cursor"),
            None => info!(tracker = tracker.id(), "no saved cursor, starting from the beginning"),
        }
        Ok(Self {
            tracker,
            source,
            cursors,
            page_size,
            poll_interval,
            cursor,
            state: TrackerState::Idle,
        })
    }

    pub fn id(&self) -> &'static str {
        self.tracker.id()
    }

    /// Position of the last applied event (as persisted).
    pub fn cursor(&self) -> Option<&EventCursor> {
        self.cursor.as_ref()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Run one fetch → apply → persist cycle.
    pub async fn poll_once(&mut self) -> Result<CycleOutcome, IndexerError> {
        self.state = TrackerState::Fetching;
        let fetched = self.fetch().await;
        let outcome = match fetched {
            Ok(page) => self.apply_page(page).await,
            Err(e) => Err(e),
        };
        self.state = TrackerState::Idle;
        outcome
    }

    /// Delay before the next cycle: zero while a backlog is known to be
    /// pending, the polling interval otherwise.
    pub fn next_delay(&self, outcome: &Result<CycleOutcome, IndexerError>) -> Duration {
        match outcome {
            Ok(o) if o.has_more => Duration::ZERO,
            _ => self.poll_interval,
        }
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(tracker = self.id(), filter = ?self.tracker.filter, "tracker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.state = TrackerState::Fetching;
            let fetched = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                page = self.fetch() => page,
            };

            // From here on the cycle runs to completion.
            let outcome = match fetched {
                Ok(page) => self.apply_page(page).await,
                Err(e) => Err(e),
            };
            self.state = TrackerState::Idle;
            self.log_outcome(&outcome);

            let delay = self.next_delay(&outcome);
            if delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state = TrackerState::Stopped;
        info!(tracker = self.id(), cursor = ?self.cursor, "tracker stopped");
    }

    async fn fetch(&self) -> Result<EventPage, IndexerError> {
        debug!(tracker = self.id(), after = ?self.cursor, "polling");
        self.source
            .query_events(&self.tracker.filter, self.cursor.as_ref(), self.page_size)
            .await
    }

    async fn apply_page(&mut self, page: EventPage) -> Result<CycleOutcome, IndexerError> {
        let Some(last) = page.last_position().cloned() else {
            return Ok(CycleOutcome {
                events: 0,
                report: BatchReport::default(),
                has_more: false,
            });
        };

        self.state = TrackerState::Applying;
        let report = self.tracker.handler.handle_batch(&page.data).await?;

        self.state = TrackerState::Persisting;
        self.cursors.save(&last).await?;
        self.cursor = Some(last);

        Ok(CycleOutcome {
            events: page.data.len(),
            report,
            has_more: page.has_next_page,
        })
    }

    fn log_outcome(&self, outcome: &Result<CycleOutcome, IndexerError>) {
        match outcome {
            Ok(o) if o.events > 0 => info!(
                tracker = self.id(),
                events = o.events,
                applied = o.report.applied,
                duplicates = o.report.duplicates,
                skipped = o.report.skipped,
                has_more = o.has_more,
                "page applied"
            ),
            Ok(_) => debug!(tracker = self.id(), "no new events"),
            Err(e) => warn!(
                tracker = self.id(),
                cursor = ?self.cursor,
                error = %e,
                retry_in_ms = self.poll_interval.as_millis() as u64,
                "poll cycle failed, cursor not advanced"
            ),
        }
    }
}

// ─── Indexer ─────────────────────────────────────────────────────────────────

/// Runs every registered tracker concurrently over a shared source and store.
pub struct Indexer {
    config: IndexerConfig,
    source: Arc<dyn EventSource>,
    cursors: Arc<dyn CursorStore>,
    registry: TrackerRegistry,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        source: Arc<dyn EventSource>,
        cursors: Arc<dyn CursorStore>,
        registry: TrackerRegistry,
    ) -> Self {
        Self {
            config,
            source,
            cursors,
            registry,
        }
    }

    /// Load every tracker's cursor, then spawn one task per tracker.
    ///
    /// Fails without starting anything if a cursor cannot be loaded.
    pub async fn spawn(self) -> Result<IndexerHandle, IndexerError> {
        self.config.validate()?;
        if self.registry.is_empty() {
            return Err(IndexerError::Config("no trackers registered".into()));
        }

        info!(
            endpoint = self.source.endpoint(),
            package = %self.config.package_id,
            module = %self.config.module_name,
            poll_interval_ms = self.config.poll_interval_ms,
            trackers = self.registry.len(),
            "starting event indexer"
        );

        let mut loops = Vec::with_capacity(self.registry.len());
        for tracker in self.registry.iter() {
            loops.push(
                TrackerLoop::resume(
                    tracker.clone(),
                    self.source.clone(),
                    self.cursors.clone(),
                    self.config.page_size,
                    self.config.poll_interval(),
                )
                .await?,
            );
        }

        let (shutdown, rx) = watch::channel(false);
        let tasks = loops
            .into_iter()
            .map(|tracker_loop| {
                let id = tracker_loop.id();
                (id, tokio::spawn(tracker_loop.run(rx.clone())))
            })
            .collect();

        Ok(IndexerHandle { shutdown, tasks })
    }
}

/// Handle to the running tracker tasks.
pub struct IndexerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl IndexerHandle {
    pub fn tracker_ids(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(id, _)| *id).collect()
    }

    /// Signal every loop to stop and wait for in-flight cycles to finish.
    pub async fn shutdown(self) {
        info!("stopping event indexer");
        let _ = self.shutdown.send(true);

        let (ids, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        for (id, joined) in ids.into_iter().zip(futures::future::join_all(handles).await) {
            if let Err(e) = joined {
                error!(tracker = id, error = %e, "tracker task failed");
            }
        }
        info!("event indexer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{Checkpoint, MemoryCursorStore};
    use crate::event::{ElectionEvent, EventKind};
    use crate::handler::{ApplyOutcome, EventHandler};
    use crate::types::{EventFilter, RawEvent};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    // ── Fakes ────────────────────────────────────────────────────────────────

    /// Replays scripted responses and records the cursor of every query.
    #[derive(Default)]
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<EventPage, IndexerError>>>,
        queried_after: Mutex<Vec<Option<EventCursor>>>,
    }

    impl ScriptedSource {
        fn push(&self, page: Result<EventPage, IndexerError>) {
            self.pages.lock().unwrap().push_back(page);
        }

        fn queried_after(&self) -> Vec<Option<EventCursor>> {
            self.queried_after.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn query_events(
            &self,
            _filter: &EventFilter,
            after: Option<&EventCursor>,
            _limit: usize,
        ) -> Result<EventPage, IndexerError> {
            self.queried_after.lock().unwrap().push(after.cloned());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EventPage::default()))
        }

        fn endpoint(&self) -> &str {
            "scripted"
        }
    }

    /// Records applied event positions; fails the batch while `fail` is set.
    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<EventCursor>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn kind(&self) -> EventKind {
            EventKind::VoteCast
        }

        async fn apply(
            &self,
            _event: &ElectionEvent,
            raw: &RawEvent,
        ) -> Result<ApplyOutcome, IndexerError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(IndexerError::Storage("database is locked".into()));
            }
            self.applied.lock().unwrap().push(raw.id.clone());
            Ok(ApplyOutcome::Applied)
        }
    }

    /// Cursor store whose `save` fails while `fail` is set.
    #[derive(Default)]
    struct FlakyCursors {
        inner: MemoryCursorStore,
        fail: AtomicBool,
    }

    #[async_trait]
    impl CursorStore for FlakyCursors {
        async fn load(&self, tracker_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
            self.inner.load(tracker_id).await
        }
        async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(IndexerError::Storage("connection refused".into()));
            }
            self.inner.save(checkpoint).await
        }
        async fn delete(&self, tracker_id: &str) -> Result<(), IndexerError> {
            self.inner.delete(tracker_id).await
        }
        async fn list(&self) -> Result<Vec<Checkpoint>, IndexerError> {
            self.inner.list().await
        }
    }

    fn vote(digest: &str, seq: u32) -> RawEvent {
        RawEvent {
            id: EventCursor::new(digest, seq.to_string()),
            package_id: "0x2a".into(),
            transaction_module: "vote".into(),
            sender: "0xD".into(),
            event_type: "0x2a::vote::EventVoteCast".into(),
            parsed_json: Some(serde_json::json!({
                "election_id": "e1", "voter": format!("0x{digest}{seq}"), "candidate": "0xB"
            })),
            timestamp_ms: None,
        }
    }

    fn page(events: Vec<RawEvent>, has_next_page: bool) -> EventPage {
        let next_cursor = events.last().map(|e| e.id.clone());
        EventPage {
            data: events,
            next_cursor,
            has_next_page,
        }
    }

    fn tracker(handler: Arc<Recorder>) -> Tracker {
        Tracker {
            kind: EventKind::VoteCast,
            filter: EventFilter::move_event("0x2a", "vote", "EventVoteCast"),
            handler,
        }
    }

    async fn build(
        source: &Arc<ScriptedSource>,
        handler: &Arc<Recorder>,
        cursors: &Arc<FlakyCursors>,
    ) -> TrackerLoop {
        TrackerLoop::resume(
            tracker(handler.clone()),
            source.clone(),
            cursors.clone(),
            50,
            Duration::from_millis(5_000),
        )
        .await
        .unwrap()
    }

    async fn saved(cursors: &FlakyCursors) -> Option<EventCursor> {
        cursors.load("EventVoteCast").await.unwrap().map(|cp| cp.cursor)
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn applies_page_then_persists_last_position() {
        let source = Arc::new(ScriptedSource::default());
        let handler = Arc::new(Recorder::default());
        let cursors = Arc::new(FlakyCursors::default());

        source.push(Ok(page(vec![vote("A", 0), vote("A", 1)], true)));
        source.push(Ok(page(vec![vote("B", 0)], false)));

        let mut lp = build(&source, &handler, &cursors).await;

        let first = lp.poll_once().await;
        assert_eq!(first.as_ref().unwrap().events, 2);
        assert_eq!(lp.next_delay(&first), Duration::ZERO, "backlog drains immediately");
        assert_eq!(saved(&cursors).await, Some(EventCursor::new("A", "1")));

        let second = lp.poll_once().await;
        assert_eq!(lp.next_delay(&second), Duration::from_millis(5_000));
        assert_eq!(saved(&cursors).await, Some(EventCursor::new("B", "0")));
        assert_eq!(lp.cursor(), Some(&EventCursor::new("B", "0")));
        assert_eq!(lp.state(), TrackerState::Idle);

        assert_eq!(source.queried_after(), vec![None, Some(EventCursor::new("A", "1"))]);
        assert_eq!(handler.applied.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_page_keeps_cursor_and_backs_off() {
        let source = Arc::new(ScriptedSource::default());
        let handler = Arc::new(Recorder::default());
        let cursors = Arc::new(FlakyCursors::default());

        // An empty page claiming more pages must not cause busy-polling
        source.push(Ok(EventPage {
            data: vec![],
            next_cursor: None,
            has_next_page: true,
        }));

        let mut lp = build(&source, &handler, &cursors).await;
        let outcome = lp.poll_once().await;

        assert_eq!(outcome.as_ref().unwrap().events, 0);
        assert_eq!(lp.next_delay(&outcome), Duration::from_millis(5_000));
        assert!(saved(&cursors).await.is_none());
    }

    #[tokio::test]
    async fn handler_failure_retries_same_position() {
        let source = Arc::new(ScriptedSource::default());
        let handler = Arc::new(Recorder::default());
        let cursors = Arc::new(FlakyCursors::default());
        cursors
            .inner
            .save(Checkpoint {
                tracker_id: "EventVoteCast".into(),
                cursor: EventCursor::new("Z", "9"),
                updated_at: 0,
            })
            .await
            .unwrap();

        source.push(Ok(page(vec![vote("A", 0)], false)));
        source.push(Ok(page(vec![vote("A", 0)], false)));

        let mut lp = build(&source, &handler, &cursors).await;
        assert_eq!(lp.cursor(), Some(&EventCursor::new("Z", "9")), "resumed from store");

        handler.fail.store(true, Ordering::SeqCst);
        let failed = lp.poll_once().await;
        assert!(failed.is_err());
        assert_eq!(lp.next_delay(&failed), Duration::from_millis(5_000));
        assert_eq!(saved(&cursors).await, Some(EventCursor::new("Z", "9")));

        handler.fail.store(false, Ordering::SeqCst);
        lp.poll_once().await.unwrap();
        assert_eq!(saved(&cursors).await, Some(EventCursor::new("A", "0")));

        let z9 = Some(EventCursor::new("Z", "9"));
        assert_eq!(source.queried_after(), vec![z9.clone(), z9]);
    }

    #[tokio::test]
    async fn cursor_save_failure_replays_page() {
        let source = Arc::new(ScriptedSource::default());
        let handler = Arc::new(Recorder::default());
        let cursors = Arc::new(FlakyCursors::default());

        source.push(Ok(page(vec![vote("A", 0), vote("A", 1)], false)));
        source.push(Ok(page(vec![vote("A", 0), vote("A", 1)], false)));

        let mut lp = build(&source, &handler, &cursors).await;

        cursors.fail.store(true, Ordering::SeqCst);
        assert!(lp.poll_once().await.is_err());
        assert_eq!(lp.cursor(), None, "in-memory cursor not advanced");

        cursors.fail.store(false, Ordering::SeqCst);
        lp.poll_once().await.unwrap();

        assert_eq!(source.queried_after(), vec![None, None]);
        // Page applied twice; idempotent handlers make the replay harmless
        assert_eq!(handler.applied.lock().unwrap().len(), 4);
        assert_eq!(saved(&cursors).await, Some(EventCursor::new("A", "1")));
    }

    #[tokio::test]
    async fn source_failure_keeps_cursor() {
        let source = Arc::new(ScriptedSource::default());
        let handler = Arc::new(Recorder::default());
        let cursors = Arc::new(FlakyCursors::default());

        source.push(Ok(page(vec![vote("A", 0)], false)));
        source.push(Err(IndexerError::Rpc("503 Service Unavailable".into())));

        let mut lp = build(&source, &handler, &cursors).await;
        lp.poll_once().await.unwrap();
        assert!(lp.poll_once().await.is_err());

        assert_eq!(lp.cursor(), Some(&EventCursor::new("A", "0")));
        assert_eq!(saved(&cursors).await, Some(EventCursor::new("A", "0")));
    }

    #[tokio::test]
    async fn cursor_is_monotonic_across_cycles() {
        let source = Arc::new(ScriptedSource::default());
        let handler = Arc::new(Recorder::default());
        let cursors = Arc::new(FlakyCursors::default());

        source.push(Ok(page(vec![vote("A", 0)], true)));
        source.push(Err(IndexerError::Rpc("timeout".into())));
        source.push(Ok(page(vec![], false)));
        source.push(Ok(page(vec![vote("B", 0), vote("B", 1)], false)));

        let mut lp = build(&source, &handler, &cursors).await;
        let mut samples = Vec::new();
        for _ in 0..4 {
            let _ = lp.poll_once().await;
            samples.push(saved(&cursors).await);
        }

        assert_eq!(
            samples,
            vec![
                Some(EventCursor::new("A", "0")),
                Some(EventCursor::new("A", "0")),
                Some(EventCursor::new("A", "0")),
                Some(EventCursor::new("B", "1")),
            ]
        );
    }

    #[tokio::test]
    async fn indexer_runs_all_trackers_until_shutdown() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page(vec![vote("A", 0)], false)));
        let cursors = Arc::new(FlakyCursors::default());

        let mut registry = TrackerRegistry::new();
        registry.register(tracker(Arc::new(Recorder::default())));
        assert_eq!(registry.get(EventKind::VoteCast).map(|t| t.id()), Some("EventVoteCast"));

        let config = IndexerConfig {
            package_id: "0x2a".into(),
            poll_interval_ms: 10,
            ..IndexerConfig::default()
        };
        let handle = Indexer::new(config, source.clone(), cursors.clone(), registry)
            .spawn()
            .await
            .unwrap();
        assert_eq!(handle.tracker_ids(), vec!["EventVoteCast"]);

        // Wait until the loop has polled again from the persisted cursor
        for _ in 0..400 {
            if source.queried_after().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let queried = source.queried_after();
        assert!(queried.len() >= 2, "loop kept polling after the first page");
        assert_eq!(queried[0], None);
        assert_eq!(queried[1], Some(EventCursor::new("A", "0")));
        assert_eq!(saved(&cursors).await, Some(EventCursor::new("A", "0")));

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown should not hang");
    }

    /// Signals when a batch starts and holds it until released.
    #[derive(Default)]
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl EventHandler for Gate {
        fn kind(&self) -> EventKind {
            EventKind::VoteCast
        }

        async fn apply(
            &self,
            _event: &ElectionEvent,
            _raw: &RawEvent,
        ) -> Result<ApplyOutcome, IndexerError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ApplyOutcome::Applied)
        }
    }

    #[tokio::test]
    async fn shutdown_mid_apply_still_persists_the_page() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page(vec![vote("A", 0)], true)));
        source.push(Ok(page(vec![vote("B", 0)], false)));
        let cursors = Arc::new(FlakyCursors::default());
        let gate = Arc::new(Gate::default());

        let mut registry = TrackerRegistry::new();
        registry.register(Tracker {
            kind: EventKind::VoteCast,
            filter: EventFilter::move_event("0x2a", "vote", "EventVoteCast"),
            handler: gate.clone(),
        });
        let config = IndexerConfig {
            package_id: "0x2a".into(),
            poll_interval_ms: 60_000,
            ..IndexerConfig::default()
        };
        let handle = Indexer::new(config, source.clone(), cursors.clone(), registry)
            .spawn()
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), gate.entered.notified())
            .await
            .expect("handler should start applying");
        let stopping = tokio::spawn(handle.shutdown());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stopping.is_finished(), "shutdown waits for the in-flight page");
        assert!(saved(&cursors).await.is_none());

        gate.release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), stopping)
            .await
            .expect("shutdown should not hang")
            .unwrap();

        assert_eq!(saved(&cursors).await, Some(EventCursor::new("A", "0")));
        // The backlog page is left for the next run
        assert_eq!(source.queried_after(), vec![None]);
    }

    #[tokio::test]
    async fn spawn_rejects_empty_registry() {
        let config = IndexerConfig {
            package_id: "0x2a".into(),
            ..IndexerConfig::default()
        };
        let err = Indexer::new(
            config,
            Arc::new(ScriptedSource::default()),
            Arc::new(MemoryCursorStore::new()),
            TrackerRegistry::new(),
        )
        .spawn()
        .await
        .err()
        .unwrap();
        assert!(matches!(err, IndexerError::Config(_)));
    }
}
