//! Connection lifecycle events.

/// Notifications published on a client's `events()` channel.
///
/// Protocol messages go to callbacks; these describe the connection itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// No unit arrived within the liveness window. Advisory only.
    Timeout,
    /// A batch of chat membership changes.
    MembershipChanged {
        joined: Vec<String>,
        left: Vec<String>,
    },
    /// An EventSub session is usable for subscriptions.
    SessionReady(String),
    /// The given EventSub session id is no longer valid; subscriptions
    /// made against it must be recreated.
    SessionInvalidated(String),
    /// A PubSub PING went unanswered.
    HeartbeatMissed,
    /// The server asked the client to reconnect.
    ReconnectRequested,
    /// The transport closed or failed. Sent once per connection.
    Disconnected,
}
