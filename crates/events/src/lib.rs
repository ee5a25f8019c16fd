//! # Event Bus Adapter
//!
//! A thin publish/subscribe and queue-subscribe primitive over a
//! subject-addressed broker (spec §2). As a Layer 0 crate, it depends only on
//! `core-types` and provides the definitive vocabulary — envelope shape,
//! subjects, payload structs — for every message that crosses a component
//! boundary in this system.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod messages;
pub mod subjects;

pub use bus::{BroadcastSubscription, InProcessBus, QueueSubscription};
pub use envelope::{EventEnvelope, RawEnvelope};
pub use error::EventsError;
pub use messages::{
    IndicatorSnapshot, KillSwitchPayload, OrderEventPayload, PriceUpdatePayload,
    RiskViolationPayload, SignalPayload, TradeEventPayload,
};
