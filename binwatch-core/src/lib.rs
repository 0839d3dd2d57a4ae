//! Core types and service wiring for the binwatch waste bin dashboard.

/// Fill histogram, collection order, and headline numbers.
pub mod analytics;
/// Bundle of ports connecting the service to its backends.
pub mod backend;
/// Map framing helpers.
pub mod geo;
/// Domain models and identifiers.
pub mod model;
/// Traits describing the registry, change feed, and routing interfaces.
pub mod ports;
/// Overflow prediction engine.
pub mod prediction;
/// High-level service facade used by clients.
pub mod service;
/// Event-driven snapshot store.
pub mod store;
/// Validation of registry rows and form input.
pub mod validation;

pub use analytics::*;
pub use backend::*;
pub use geo::*;
pub use model::*;
pub use ports::*;
pub use prediction::*;
pub use service::*;
pub use store::*;
pub use validation::*;
