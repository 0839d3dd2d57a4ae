//! Bundle of the ports a dashboard needs to talk to the outside world.

use std::sync::Arc;

use crate::ports::{BinRegistryPort, ChangeFeedPort, RoutingPort};

/// Collection of ports implementing the registry, its change feed, and routing.
#[derive(Clone)]
pub struct Backend {
    /// Implementation for reading and mutating bins.
    pub registry: Arc<dyn BinRegistryPort>,
    /// Implementation for change notifications on the bins collection.
    pub change_feed: Arc<dyn ChangeFeedPort>,
    /// Implementation for computing routes to a bin.
    pub routing: Arc<dyn RoutingPort>,
}

impl Backend {
    /// Build a backend from its ports.
    #[must_use]
    pub fn new(
        registry: Arc<dyn BinRegistryPort>,
        change_feed: Arc<dyn ChangeFeedPort>,
        routing: Arc<dyn RoutingPort>,
    ) -> Self {
        Self {
            registry,
            change_feed,
            routing,
        }
    }
}
