//! Copium - replicated job-application tracking
//!
//! Keeps one authoritative application store consistent with two derived
//! views, a filterable search index and an append-only analytics event log,
//! through a write-then-publish saga with compensation, an ordered
//! at-least-once event bus and idempotent projectors.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod interfaces;
pub mod model;
pub mod projectors;
pub mod revert;
pub mod standalone;
pub mod storage;
pub mod utils;

pub use error::{Error, Result};
