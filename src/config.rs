//! Connection configuration.
//!
//! Every client takes a plain config struct with sensible defaults. The
//! client builders expose fluent setters for the same fields, so most
//! callers never construct these directly.

use std::time::Duration;

/// Default capacity of the per-connection dispatch queue.
pub const DEFAULT_DISPATCH_QUEUE_CAPACITY: usize = 1024;

/// Default capacity of the outbound unit channel.
pub const DEFAULT_SEND_CHANNEL_CAPACITY: usize = 256;

/// Default capacity of the connection event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default silence window before a chat connection reports a timeout.
///
/// The server pings roughly every five minutes.
pub const DEFAULT_IRC_TIMEOUT: Duration = Duration::from_secs(6 * 60);

/// Default maximum length of a single chat line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Quiet period used to coalesce join/part bursts.
pub const DEFAULT_MEMBERSHIP_QUIET_PERIOD: Duration = Duration::from_secs(2);

/// Upper bound on how long a membership batch may keep growing.
pub const DEFAULT_MEMBERSHIP_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default EventSub endpoint.
pub const DEFAULT_EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws?keepalive_timeout_seconds=600";

/// Keepalive window used until the welcome advertises the real one.
pub const DEFAULT_EVENTSUB_WELCOME_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack added to the advertised EventSub keepalive interval.
pub const DEFAULT_EVENTSUB_KEEPALIVE_GRACE: Duration = Duration::from_secs(5);

/// Default PubSub endpoint.
pub const DEFAULT_PUBSUB_URL: &str = "wss://pubsub-edge.twitch.tv";

/// Base PubSub ping interval.
pub const DEFAULT_PUBSUB_PING_INTERVAL: Duration = Duration::from_secs(4 * 60);

/// Fractional jitter applied to the PubSub ping interval.
pub const DEFAULT_PUBSUB_PING_JITTER: f64 = 0.05;

/// How long to wait for a PONG after each PING.
pub const DEFAULT_PUBSUB_PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by every protocol's receive pipeline.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Bounded FIFO between the framing loop and the dispatch worker.
    pub queue_capacity: usize,
    /// Outbound unit channel capacity.
    pub send_capacity: usize,
    /// Connection event broadcast capacity.
    pub event_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_DISPATCH_QUEUE_CAPACITY,
            send_capacity: DEFAULT_SEND_CHANNEL_CAPACITY,
            event_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Configuration for the chat (IRC) connection.
#[derive(Debug, Clone)]
pub struct IrcConfig {
    /// Silence window before `Timeout` is raised.
    pub timeout: Duration,
    /// Longest accepted line, excluding CRLF.
    pub max_line_length: usize,
    /// Track channel membership and emit batched membership events.
    pub track_users: bool,
    /// Quiet period for membership batching.
    pub membership_quiet_period: Duration,
    /// Cap on the total age of a membership batch.
    pub membership_max_delay: Duration,
    /// Capabilities requested after authentication.
    pub capabilities: Vec<String>,
    /// Receive pipeline settings.
    pub dispatch: DispatchConfig,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_IRC_TIMEOUT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            track_users: false,
            membership_quiet_period: DEFAULT_MEMBERSHIP_QUIET_PERIOD,
            membership_max_delay: DEFAULT_MEMBERSHIP_MAX_DELAY,
            capabilities: vec![
                "twitch.tv/tags".to_string(),
                "twitch.tv/commands".to_string(),
                "twitch.tv/membership".to_string(),
            ],
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Configuration for the EventSub WebSocket client.
#[derive(Debug, Clone)]
pub struct EventSubConfig {
    /// Initial endpoint.
    pub url: String,
    /// Liveness window before the first welcome.
    pub welcome_timeout: Duration,
    /// Slack added to the advertised keepalive interval.
    pub keepalive_grace: Duration,
    /// Receive pipeline settings.
    pub dispatch: DispatchConfig,
}

impl Default for EventSubConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_EVENTSUB_URL.to_string(),
            welcome_timeout: DEFAULT_EVENTSUB_WELCOME_TIMEOUT,
            keepalive_grace: DEFAULT_EVENTSUB_KEEPALIVE_GRACE,
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Configuration for the PubSub WebSocket client.
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    /// Endpoint.
    pub url: String,
    /// Base interval between PINGs.
    pub ping_interval: Duration,
    /// Fractional jitter (0.05 = ±5%).
    pub ping_jitter: f64,
    /// How long to wait for the matching PONG.
    pub pong_timeout: Duration,
    /// Receive pipeline settings.
    pub dispatch: DispatchConfig,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PUBSUB_URL.to_string(),
            ping_interval: DEFAULT_PUBSUB_PING_INTERVAL,
            ping_jitter: DEFAULT_PUBSUB_PING_JITTER,
            pong_timeout: DEFAULT_PUBSUB_PONG_TIMEOUT,
            dispatch: DispatchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irc_defaults() {
        let config = IrcConfig::default();
        assert_eq!(config.membership_quiet_period, Duration::from_secs(2));
        assert!(!config.track_users);
        assert_eq!(config.capabilities.len(), 3);
        assert_eq!(config.dispatch.queue_capacity, DEFAULT_DISPATCH_QUEUE_CAPACITY);
    }

    #[test]
    fn test_pubsub_defaults() {
        let config = PubSubConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(240));
        assert_eq!(config.pong_timeout, Duration::from_secs(10));
        assert!((config.ping_jitter - 0.05).abs() < f64::EPSILON);
    }
}
