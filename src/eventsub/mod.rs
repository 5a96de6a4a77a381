//! EventSub WebSocket protocol.
//!
//! Session-oriented notifications: a welcome assigns a session id, the
//! caller subscribes against it over REST, and the server may move the
//! client to a new connection at any time.

mod client;
mod message;
mod session;

pub use client::{EventSubClient, EventSubClientBuilder};
pub use message::{
    EventSubMessage, EventSubMessageType, Keepalive, Metadata, Notification, NotificationPayload,
    Reconnect, Revocation, RevocationPayload, SessionEnvelope, SessionPayload, SubscriptionInfo,
    SubscriptionTransportInfo, Welcome,
};
pub use session::{
    Quota, Session, SessionSlot, SessionState, SubscriptionRequest, SubscriptionTransport,
};
