//! PubSub WebSocket protocol.
//!
//! Topic subscriptions over a single socket, kept alive by a client-driven
//! PING/PONG heartbeat.

mod client;
mod heartbeat;
mod message;

pub use client::{ConnectionState, PubSubClient, PubSubClientBuilder};
pub use heartbeat::{clamp_jitter, jittered, Heartbeat, MAX_JITTER};
pub use message::{make_nonce, PubSubKind, PubSubMessage};
