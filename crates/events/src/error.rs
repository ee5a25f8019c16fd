use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Failed to serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to deserialize event payload for subject '{subject}': {source}")]
    Deserialization {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No subscribers are currently registered for subject '{0}'")]
    NoSubscribers(String),

    #[error("Timed out waiting for a response on subject '{0}'")]
    Timeout(String),
}
