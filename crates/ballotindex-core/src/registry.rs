//! Tracker registry: binds each event kind to its filter and handler.

use std::sync::Arc;

use crate::event::EventKind;
use crate::handler::EventHandler;
use crate::handlers::{
    CandidateRegisteredHandler, ElectionCreatedHandler, ElectionEndedHandler, VoteCastHandler,
    VoterRegisteredHandler,
};
use crate::store::ElectionStore;
use crate::types::EventFilter;

/// One independently polled event stream.
#[derive(Clone)]
pub struct Tracker {
    pub kind: EventKind,
    pub filter: EventFilter,
    pub handler: Arc<dyn EventHandler>,
}

impl Tracker {
    /// Tracker identity, also the key of its cursor row.
    pub fn id(&self) -> &'static str {
        self.kind.event_name()
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("kind", &self.kind)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Ordered table of trackers, at most one per event kind.
#[derive(Debug, Clone, Default)]
pub struct TrackerRegistry {
    trackers: Vec<Tracker>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five election trackers for `<package_id>::<module_name>`, in the
    /// order ElectionCreated, CandidateRegistered, VoterRegistered, VoteCast,
    /// ElectionEnded.
    pub fn election(package_id: &str, module_name: &str, store: Arc<dyn ElectionStore>) -> Self {
        let mut registry = Self::new();
        for kind in EventKind::ALL {
            let handler: Arc<dyn EventHandler> = match kind {
                EventKind::ElectionCreated => Arc::new(ElectionCreatedHandler::new(store.clone())),
                EventKind::CandidateRegistered => {
                    Arc::new(CandidateRegisteredHandler::new(store.clone()))
                }
                EventKind::VoterRegistered => Arc::new(VoterRegisteredHandler::new(store.clone())),
                EventKind::VoteCast => Arc::new(VoteCastHandler::new(store.clone())),
                EventKind::ElectionEnded => Arc::new(ElectionEndedHandler::new(store.clone())),
            };
            registry.register(Tracker {
                kind,
                filter: EventFilter::move_event(package_id, module_name, kind.event_name()),
                handler,
            });
        }
        registry
    }

    /// Register a tracker, replacing any existing tracker for the same kind.
    pub fn register(&mut self, tracker: Tracker) {
        match self.trackers.iter_mut().find(|t| t.kind == tracker.kind) {
            Some(existing) => *existing = tracker,
            None => self.trackers.push(tracker),
        }
    }

    pub fn get(&self, kind: EventKind) -> Option<&Tracker> {
        self.trackers.iter().find(|t| t.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tracker> {
        self.trackers.iter()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}
