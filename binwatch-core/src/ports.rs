//! Traits describing the external collaborators and shared helper types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::{BinId, BinPatch, BinRecord, ChangeEvent, Coordinate, NewBin, Route};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the registry or the routing service.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The backend answered with an error status.
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message reported by the backend.
        message: String,
    },
    /// The routing service could not connect the two points.
    #[error("No route found")]
    NoRoute,
    /// The change feed stopped.
    #[error("Change feed closed")]
    FeedClosed,
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Create/read/update/delete access to the remote `bins` collection.
pub trait BinRegistryPort: Send + Sync {
    /// Read every row, ordered by fill level descending.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the registry request fails.
    async fn fetch_all(&self) -> Result<Vec<BinRecord>, PortError>;

    /// Insert a new bin.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the registry refuses the row or is unreachable.
    async fn insert(&self, bin: &NewBin) -> Result<(), PortError>;

    /// Apply a partial update to one bin.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the registry request fails.
    async fn update(&self, id: &BinId, patch: &BinPatch) -> Result<(), PortError>;

    /// Delete one bin.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the registry request fails.
    async fn delete(&self, id: &BinId) -> Result<(), PortError>;
}

/// Live subscription to the change feed.
///
/// Dropping the subscription stops the background task that feeds it.
pub struct ChangeSubscription {
    receiver: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    /// Wrap a receiver and the task producing into it.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<ChangeEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { receiver, task }
    }

    /// Take the next pending event without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::FeedClosed`] once the producer has gone away.
    pub fn try_next(&mut self) -> Result<Option<ChangeEvent>, PortError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(PortError::FeedClosed),
        }
    }

    /// Wait for the next event; `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
/// Push notifications about changes to the `bins` collection.
pub trait ChangeFeedPort: Send + Sync {
    /// Open a subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the feed cannot be established.
    async fn subscribe(&self) -> Result<ChangeSubscription, PortError>;
}

#[async_trait]
/// Turn-by-turn routing between two coordinates.
pub trait RoutingPort: Send + Sync {
    /// Compute a route from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::NoRoute`] when the service finds no path, or
    /// another [`PortError`] when the request fails.
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, PortError>;
}
