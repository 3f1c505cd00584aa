//! Abstract interfaces for the replicated stores.
//!
//! These traits define the contracts for:
//! - Authoritative application store (source of truth)
//! - Search index (derived, filterable read model)
//! - Warehouse (derived, append-only event log)
//! - Event bus (ordered at-least-once delivery)
//! - Cache versions (pagination cache invalidation)
//! - Session verification (owner identity)
//! - Projectors (apply one event to a derived store)

pub mod application_store;
pub mod cache;
pub mod event_bus;
pub mod projector;
pub mod search_index;
pub mod session;
pub mod warehouse;

pub use application_store::{ApplicationStore, StoreError};
pub use cache::{CacheError, CacheVersions};
pub use event_bus::{BusError, EventBus, PublishReceipt};
pub use projector::{Projector, ProjectorError};
pub use search_index::{
    SearchDocument, SearchError, SearchFilters, SearchIndex, SearchPage, SearchQuery, StatusPatch,
};
pub use session::{AuthError, SessionVerifier};
pub use warehouse::{Warehouse, WarehouseError};
