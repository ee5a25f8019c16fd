use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;

use crate::envelope::{EventEnvelope, RawEnvelope};
use crate::error::EventsError;

/// Default capacity of a broadcast subject's ring buffer. A slow broadcast
/// subscriber that falls more than this many messages behind observes a
/// `Lagged` error on its next `recv` rather than unbounded memory growth.
const BROADCAST_CAPACITY: usize = 1024;

/// Thin publish/subscribe and queue-subscribe primitive over a
/// subject-addressed broker (spec §2 "Event Bus Adapter"). A production
/// deployment backs this with a real broker (NATS, Kafka, ...); this
/// in-process adapter backs it with `tokio::sync::broadcast` for fan-out
/// subjects and `async_channel` for the one queue-group subject
/// (`strategy.signal`), giving the exact subscriber semantics spec §5
/// requires without depending on an external service for tests.
pub struct InProcessBus {
    broadcast: Mutex<HashMap<String, broadcast::Sender<RawEnvelope>>>,
    queues: Mutex<HashMap<String, (async_channel::Sender<RawEnvelope>, async_channel::Receiver<RawEnvelope>)>>,
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessBus {
    pub fn new() -> Self {
        Self {
            broadcast: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes a typed payload onto `subject`. Delivered to every broadcast
    /// subscriber of `subject` (if any) and to the subject's queue group (if
    /// one has been established via [`queue_subscribe`]). A publish with no
    /// subscribers of either kind at all is not an error: the bus does not
    /// guarantee delivery, only ordering per-subject per-subscriber (spec §5).
    pub async fn publish<T: Serialize>(&self, subject: &str, data: T) -> Result<(), EventsError> {
        let value = serde_json::to_value(data)?;
        let envelope = EventEnvelope::new(subject, value);
        self.publish_raw(subject, envelope).await
    }

    async fn publish_raw(&self, subject: &str, envelope: RawEnvelope) -> Result<(), EventsError> {
        if let Some(tx) = self.broadcast.lock().unwrap().get(subject) {
            // A `SendError` here just means there are currently no live
            // broadcast receivers; that is not a publish failure.
            let _ = tx.send(envelope.clone());
        }

        let queue_tx = self.queues.lock().unwrap().get(subject).map(|(tx, _)| tx.clone());
        if let Some(tx) = queue_tx {
            // `send` is the bus-publish suspension point spec §5 calls out;
            // an error here means every queue consumer has been dropped.
            let _ = tx.send(envelope).await;
        }

        Ok(())
    }

    /// Subscribes to `subject` as a broadcast consumer: every message
    /// published after this call is delivered to this receiver independently
    /// of any other subscriber (spec §5, §6).
    pub fn subscribe(&self, subject: &str) -> BroadcastSubscription {
        let mut channels = self.broadcast.lock().unwrap();
        let tx = channels
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .clone();
        BroadcastSubscription { subject: subject.to_string(), rx: tx.subscribe() }
    }

    /// Joins the named subject's queue group: every message published to
    /// `subject` is delivered to exactly one queue-group member, never all of
    /// them (spec §5 "Queue subscriber for signals"). All callers that join
    /// the same subject share one logical group — this system has exactly
    /// one queue-group subject, `strategy.signal`, consumed only by the order
    /// manager, so there is no separate named-group parameter to thread
    /// through.
    pub fn queue_subscribe(&self, subject: &str) -> QueueSubscription {
        let mut queues = self.queues.lock().unwrap();
        let (_, rx) = queues
            .entry(subject.to_string())
            .or_insert_with(async_channel::unbounded);
        QueueSubscription { subject: subject.to_string(), rx: rx.clone() }
    }
}

/// A live broadcast subscription. Wraps `broadcast::Receiver` so callers get
/// typed payloads back out without re-implementing the `from_value` dance at
/// every call site.
pub struct BroadcastSubscription {
    subject: String,
    rx: broadcast::Receiver<RawEnvelope>,
}

impl BroadcastSubscription {
    /// Waits for and decodes the next message. Returns `Ok(None)` if every
    /// publisher of this subject has been dropped and the channel is closed.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, EventsError> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Ok(Some(decode(&self.subject, envelope)?)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(subject = %self.subject, skipped = n, "broadcast subscriber lagged, dropping skipped messages");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

/// A live queue-group subscription.
pub struct QueueSubscription {
    subject: String,
    rx: async_channel::Receiver<RawEnvelope>,
}

impl QueueSubscription {
    /// Waits for and decodes the next message this consumer instance wins the
    /// race for. Returns `Ok(None)` once every publisher has dropped its
    /// sender and the queue is both closed and drained.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, EventsError> {
        match self.rx.recv().await {
            Ok(envelope) => Ok(Some(decode(&self.subject, envelope)?)),
            Err(async_channel::RecvError) => Ok(None),
        }
    }
}

fn decode<T: DeserializeOwned>(subject: &str, envelope: RawEnvelope) -> Result<T, EventsError> {
    serde_json::from_value(envelope.data).map_err(|source| EventsError::Deserialization {
        subject: subject.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping(u32);

    #[tokio::test]
    async fn broadcast_subscribers_each_receive_every_message() {
        let bus = InProcessBus::new();
        let mut a = bus.subscribe("test.ping");
        let mut b = bus.subscribe("test.ping");

        bus.publish("test.ping", Ping(1)).await.unwrap();

        assert_eq!(a.recv::<Ping>().await.unwrap(), Some(Ping(1)));
        assert_eq!(b.recv::<Ping>().await.unwrap(), Some(Ping(1)));
    }

    #[tokio::test]
    async fn queue_subscribers_each_get_a_distinct_message() {
        let bus = InProcessBus::new();
        let mut a = bus.queue_subscribe("test.signal");
        let mut b = bus.queue_subscribe("test.signal");

        bus.publish("test.signal", Ping(1)).await.unwrap();
        bus.publish("test.signal", Ping(2)).await.unwrap();

        let first = a.recv::<Ping>().await.unwrap().unwrap();
        let second = b.recv::<Ping>().await.unwrap().unwrap();
        let mut got = vec![first.0, second.0];
        got.sort();
        assert_eq!(got, vec![1, 2]);
    }
}
