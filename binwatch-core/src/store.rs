//! Event-driven holder of the dashboard snapshot.
//!
//! The store owns a single [`StoreState`]. Every change goes through
//! [`reduce`], which replaces the snapshot wholesale, and the resulting state is
//! published to all subscribers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::Bin;
use crate::validation::RejectedRecord;

#[derive(Debug, Clone, PartialEq)]
/// Result of one full read of the registry.
pub struct Snapshot {
    /// Valid bins, in registry order (fullest first).
    pub bins: Vec<Bin>,
    /// Rows that failed validation.
    pub rejected: Vec<RejectedRecord>,
    /// When the read completed.
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Everything a view needs to render the registry.
pub struct StoreState {
    /// Latest successful read, if any.
    pub snapshot: Option<Arc<Snapshot>>,
    /// A read is in flight.
    pub loading: bool,
    /// Message of the last failed read, cleared by the next success.
    pub last_error: Option<String>,
    /// Incremented on every snapshot replacement.
    pub revision: u64,
}

impl StoreState {
    /// Bins of the current snapshot, empty before the first read.
    #[must_use]
    pub fn bins(&self) -> &[Bin] {
        self.snapshot
            .as_deref()
            .map(|snapshot| snapshot.bins.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
/// Inputs to the store.
pub enum StoreEvent {
    /// A registry read has begun.
    FetchStarted,
    /// A registry read returned a new snapshot.
    FetchSucceeded(Snapshot),
    /// A registry read failed.
    FetchFailed(String),
}

/// Compute the state following `event`.
///
/// A failed read keeps the previous snapshot so the view stays populated.
#[must_use]
pub fn reduce(state: &StoreState, event: StoreEvent) -> StoreState {
    match event {
        StoreEvent::FetchStarted => StoreState {
            loading: true,
            ..state.clone()
        },
        StoreEvent::FetchSucceeded(snapshot) => StoreState {
            snapshot: Some(Arc::new(snapshot)),
            loading: false,
            last_error: None,
            revision: state.revision + 1,
        },
        StoreEvent::FetchFailed(message) => StoreState {
            loading: false,
            last_error: Some(message),
            ..state.clone()
        },
    }
}

/// Publishes [`StoreState`] changes to any number of subscribers.
#[derive(Debug)]
pub struct BinStore {
    sender: watch::Sender<StoreState>,
}

impl Default for BinStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BinStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(StoreState::default());
        Self { sender }
    }

    /// Apply an event and notify subscribers.
    pub fn dispatch(&self, event: StoreEvent) {
        self.sender.send_modify(|state| *state = reduce(state, event));
    }

    /// Receiver that observes every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.sender.subscribe()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn current(&self) -> StoreState {
        self.sender.borrow().clone()
    }
}
