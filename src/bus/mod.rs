//! Event bus implementations.
//!
//! This module contains:
//! - `ChannelEventBus`: in-process bus with ordering keys, ack/nack and
//!   dead-lettering
//! - `MockEventBus`: records publishes, with failure and delay injection
//!
//! The [`EventBus`] trait itself lives in [`crate::interfaces::event_bus`].

pub mod channel;
pub mod mock;

pub use channel::{ChannelConfig, ChannelEventBus, Delivery, Envelope, Subscription};
pub use mock::MockEventBus;

pub use crate::interfaces::event_bus::{BusError, EventBus, PublishReceipt, Result};
