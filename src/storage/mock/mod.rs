//! Mock storage implementations.
//!
//! In-memory stand-ins for the external stores. Each keeps its state behind
//! a `tokio::sync::RwLock` and exposes `set_fail_on_*` switches for failure
//! injection. The standalone runtime uses them as its backends.

mod application_store;
mod cache;
mod search_index;
mod warehouse;

pub use application_store::MockApplicationStore;
pub use cache::MockCacheVersions;
pub use search_index::MockSearchIndex;
pub use warehouse::MockWarehouse;
