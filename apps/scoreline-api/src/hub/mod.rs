//! In-process fan-out of committed results to connected clients.

pub mod broadcast;
pub mod client;
pub mod event;
pub mod policy;
pub mod registry;

pub use broadcast::{BroadcastHub, CategoryMetrics, HubError, HubMetrics, Published};
pub use client::{ClientHandle, Deliverable, DeliveryError};
pub use event::{Category, EventName, HubEvent, Topic, TopicKind};
pub use policy::{Backpressure, CategoryPolicy, Fanout, HubConfig};
