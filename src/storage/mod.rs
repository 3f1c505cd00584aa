//! Storage implementations.

pub mod mock;

pub use mock::{MockApplicationStore, MockCacheVersions, MockSearchIndex, MockWarehouse};
