//! Projectors for the derived read models, and the consumer that feeds them.
//!
//! Each projector applies one event idempotently. The
//! [`ProjectionConsumer`] pulls deliveries from a bus subscription into a
//! dispatch pool and settles each one by the projector's outcome.

mod consumer;
mod search;
mod warehouse;

pub use consumer::ProjectionConsumer;
pub use search::SearchProjector;
pub use warehouse::WarehouseProjector;

#[cfg(test)]
mod tests;
