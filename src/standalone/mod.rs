//! Standalone runtime for running copium as a single process.
//!
//! Wires in-memory stores, the channel event bus, one projection consumer
//! per derived store and the [`UserService`](crate::api::UserService).
//!
//! # Example
//!
//! ```ignore
//! use copium::config::CopiumConfig;
//! use copium::standalone::Runtime;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runtime = Runtime::start(&CopiumConfig::default()).await;
//!     let service = runtime.service();
//!     // ...
//!     runtime.shutdown().await;
//! }
//! ```

mod runtime;

pub use runtime::Runtime;
