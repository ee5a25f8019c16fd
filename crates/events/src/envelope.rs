use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// The wire envelope every bus message is wrapped in: `{id, type, timestamp, data}`
/// (spec §6). `event_type` is the subject the message was published on, carried
/// redundantly inside the payload so a consumer that dequeues from more than one
/// subject (or replays a log) can still tell messages apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// The envelope shape as it actually travels over the bus: a raw JSON `data`
/// field, so the adapter itself never needs to know the payload type of every
/// subject it carries.
pub type RawEnvelope = EventEnvelope<JsonValue>;
