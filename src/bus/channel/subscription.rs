//! Subscription queues with per-key ordering and redelivery.
//!
//! Each ordering key has its own FIFO. A key is either *ready* (its head
//! message can be handed out), *in flight* (one message delivered and not
//! yet settled) or idle. Only one message per key is in flight at a time, so
//! a consumer always sees a key's messages in publish order, including across
//! redeliveries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::ChannelConfig;

/// Message as carried by the channel bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub message_id: Uuid,
    pub ordering_key: String,
    /// JSON-encoded [`crate::events::EventMessage`].
    pub data: Vec<u8>,
    /// Number of times this message has been handed to a consumer.
    pub attempts: u32,
}

#[derive(Default)]
struct Queues {
    pending: HashMap<String, VecDeque<Envelope>>,
    ready: VecDeque<String>,
    in_flight: HashSet<String>,
    dead_letters: Vec<Envelope>,
    closed: bool,
}

impl Queues {
    fn has_head(&self, key: &str) -> bool {
        self.pending.get(key).is_some_and(|q| !q.is_empty())
    }

    /// Release a key after its in-flight message settled.
    fn release(&mut self, key: &str) {
        self.in_flight.remove(key);
        if self.has_head(key) {
            self.ready.push_back(key.to_string());
        }
    }
}

pub(super) struct SubscriptionState {
    name: String,
    config: ChannelConfig,
    queues: Mutex<Queues>,
    notify: Notify,
}

impl SubscriptionState {
    pub(super) fn new(name: String, config: ChannelConfig) -> Self {
        Self {
            name,
            config,
            queues: Mutex::new(Queues::default()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(super) fn push(&self, envelope: Envelope) {
        let mut queues = self.lock();
        if queues.closed {
            return;
        }
        let key = envelope.ordering_key.clone();
        let queue = queues.pending.entry(key.clone()).or_default();
        queue.push_back(envelope);
        if queue.len() == 1 && !queues.in_flight.contains(&key) {
            queues.ready.push_back(key);
        }
        drop(queues);
        self.notify.notify_one();
    }

    pub(super) fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Put a message back at the head of its key and release the key.
    fn requeue(&self, envelope: Envelope) {
        let mut queues = self.lock();
        let key = envelope.ordering_key.clone();
        if envelope.attempts >= self.config.max_delivery_attempts {
            error!(
                subscription = %self.name,
                message_id = %envelope.message_id,
                attempts = envelope.attempts,
                "Delivery attempts exhausted, dead-lettering message"
            );
            queues.dead_letters.push(envelope);
        } else {
            queues.pending.entry(key.clone()).or_default().push_front(envelope);
        }
        queues.release(&key);
        drop(queues);
        self.notify.notify_one();
    }

    fn dead_letter(&self, envelope: Envelope, reason: &str) {
        error!(
            subscription = %self.name,
            message_id = %envelope.message_id,
            reason,
            "Message rejected, dead-lettering"
        );
        let mut queues = self.lock();
        let key = envelope.ordering_key.clone();
        queues.dead_letters.push(envelope);
        queues.release(&key);
        drop(queues);
        self.notify.notify_one();
    }

    fn ack(&self, key: &str) {
        self.lock().release(key);
        self.notify.notify_one();
    }
}

/// A message handed to a consumer, to be settled exactly once.
///
/// Dropping an unsettled delivery puts the message back for immediate
/// redelivery, as a broker does when a consumer disconnects.
pub struct Delivery {
    envelope: Envelope,
    state: Arc<SubscriptionState>,
    settled: bool,
}

impl Delivery {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn data(&self) -> &[u8] {
        &self.envelope.data
    }

    pub fn attempts(&self) -> u32 {
        self.envelope.attempts
    }

    /// Processing succeeded; release the next message of this key.
    pub fn ack(mut self) {
        self.settled = true;
        self.state.ack(&self.envelope.ordering_key);
    }

    /// Processing failed; redeliver after the configured delay.
    ///
    /// The key stays blocked until the message is back at its head.
    pub fn nack(mut self) {
        self.settled = true;
        let envelope = std::mem::take(&mut self.envelope);
        let delay = self.state.config.redelivery_delay;
        warn!(
            subscription = %self.state.name,
            message_id = %envelope.message_id,
            attempts = envelope.attempts,
            "Message nacked, scheduling redelivery"
        );
        if delay.is_zero() {
            self.state.requeue(envelope);
            return;
        }
        let state = self.state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.requeue(envelope);
        });
    }

    /// Message can never be processed; dead-letter it without retry.
    pub fn reject(mut self, reason: &str) {
        self.settled = true;
        let envelope = std::mem::take(&mut self.envelope);
        self.state.dead_letter(envelope, reason);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.settled {
            debug!(
                subscription = %self.state.name,
                message_id = %self.envelope.message_id,
                "Unsettled delivery dropped, requeueing"
            );
            let envelope = std::mem::take(&mut self.envelope);
            self.state.requeue(envelope);
        }
    }
}

/// Named consumer of a [`super::ChannelEventBus`].
///
/// Every subscription receives every published message. A subscription is
/// meant to be drained by a single receive loop.
#[derive(Clone)]
pub struct Subscription {
    state: Arc<SubscriptionState>,
}

impl Subscription {
    pub(super) fn new(state: Arc<SubscriptionState>) -> Self {
        Self { state }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Wait for the next deliverable message.
    ///
    /// Returns `None` once the subscription is closed.
    pub async fn recv(&self) -> Option<Delivery> {
        loop {
            {
                let mut queues = self.state.lock();
                if queues.closed {
                    return None;
                }
                while let Some(key) = queues.ready.pop_front() {
                    let Some(mut envelope) =
                        queues.pending.get_mut(&key).and_then(|q| q.pop_front())
                    else {
                        continue;
                    };
                    if queues.pending.get(&key).is_some_and(|q| q.is_empty()) {
                        queues.pending.remove(&key);
                    }
                    queues.in_flight.insert(key);
                    envelope.attempts += 1;
                    return Some(Delivery {
                        envelope,
                        state: self.state.clone(),
                        settled: false,
                    });
                }
            }
            self.state.notify.notified().await;
        }
    }

    /// Stop delivering. Pending messages are discarded.
    pub fn close(&self) {
        self.state.close();
    }

    /// Messages that exhausted their attempts or were rejected.
    pub fn dead_letters(&self) -> Vec<Envelope> {
        self.state.lock().dead_letters.clone()
    }

    /// No message queued or in flight.
    pub fn is_idle(&self) -> bool {
        let queues = self.state.lock();
        queues.pending.values().all(VecDeque::is_empty) && queues.in_flight.is_empty()
    }

    /// Redelivery delay configured for this subscription.
    pub fn redelivery_delay(&self) -> Duration {
        self.state.config.redelivery_delay
    }
}
