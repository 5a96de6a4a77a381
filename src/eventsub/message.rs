//! EventSub message schemas.
//!
//! Every frame is a JSON object routed strictly by
//! `metadata.message_type`. Only the fields the session and dispatch layers
//! rely on are typed; notification events stay as raw JSON.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::dispatch::Dispatchable;
use crate::error::FormatError;

/// Closed set of EventSub message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSubMessageType {
    Welcome,
    Keepalive,
    Notification,
    Reconnect,
    Revocation,
}

impl EventSubMessageType {
    /// Map a `metadata.message_type` value. Exact match only.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session_welcome" => Some(Self::Welcome),
            "session_keepalive" => Some(Self::Keepalive),
            "notification" => Some(Self::Notification),
            "session_reconnect" => Some(Self::Reconnect),
            "revocation" => Some(Self::Revocation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "session_welcome",
            Self::Keepalive => "session_keepalive",
            Self::Notification => "notification",
            Self::Reconnect => "session_reconnect",
            Self::Revocation => "revocation",
        }
    }
}

/// The `metadata` object common to every message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Metadata {
    pub message_id: String,
    pub message_type: String,
    pub message_timestamp: DateTime<Utc>,
    /// Present on notifications and revocations.
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub subscription_version: Option<String>,
}

/// Session description carried by welcome and reconnect messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionPayload {
    pub id: String,
    pub status: String,
    /// `null` in reconnect messages.
    #[serde(default)]
    pub keepalive_timeout_seconds: Option<u64>,
    /// `null` in welcome messages.
    #[serde(default)]
    pub reconnect_url: Option<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionEnvelope {
    pub session: SessionPayload,
}

/// Transport of a subscription as reported by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionTransportInfo {
    pub method: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A subscription as reported in notifications and revocations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionInfo {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub cost: u32,
    pub condition: Value,
    pub transport: SubscriptionTransportInfo,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationPayload {
    pub subscription: SubscriptionInfo,
    /// Event body, schema depends on the subscription type.
    pub event: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RevocationPayload {
    pub subscription: SubscriptionInfo,
}

/// `session_welcome`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Welcome {
    pub metadata: Metadata,
    pub payload: SessionEnvelope,
}

impl Welcome {
    pub fn session(&self) -> &SessionPayload {
        &self.payload.session
    }
}

/// `session_keepalive`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Keepalive {
    pub metadata: Metadata,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// `notification`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    pub metadata: Metadata,
    pub payload: NotificationPayload,
}

impl Notification {
    pub fn subscription(&self) -> &SubscriptionInfo {
        &self.payload.subscription
    }

    pub fn event(&self) -> &Value {
        &self.payload.event
    }

    /// Decode the event body into a caller-defined type.
    pub fn event_as<T: DeserializeOwned>(&self) -> Result<T, FormatError> {
        T::deserialize(&self.payload.event).map_err(|e| FormatError::InvalidJson(e.to_string()))
    }
}

/// `session_reconnect`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reconnect {
    pub metadata: Metadata,
    pub payload: SessionEnvelope,
}

impl Reconnect {
    pub fn session(&self) -> &SessionPayload {
        &self.payload.session
    }
}

/// `revocation`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Revocation {
    pub metadata: Metadata,
    pub payload: RevocationPayload,
}

impl Revocation {
    pub fn subscription(&self) -> &SubscriptionInfo {
        &self.payload.subscription
    }
}

/// One received EventSub message.
#[derive(Debug, Clone, PartialEq)]
pub enum EventSubMessage {
    Welcome(Welcome),
    Keepalive(Keepalive),
    Notification(Notification),
    Reconnect(Reconnect),
    Revocation(Revocation),
}

impl EventSubMessage {
    /// Parse one complete WebSocket text message.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| FormatError::InvalidJson(e.to_string()))?;

        let kind = {
            let name = value
                .pointer("/metadata/message_type")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    FormatError::InvalidJson("missing metadata.message_type".to_string())
                })?;
            EventSubMessageType::parse(name)
                .ok_or_else(|| FormatError::UnknownMessageType(name.to_string()))?
        };

        Ok(match kind {
            EventSubMessageType::Welcome => Self::Welcome(decode(value)?),
            EventSubMessageType::Keepalive => Self::Keepalive(decode(value)?),
            EventSubMessageType::Notification => Self::Notification(decode(value)?),
            EventSubMessageType::Reconnect => Self::Reconnect(decode(value)?),
            EventSubMessageType::Revocation => Self::Revocation(decode(value)?),
        })
    }

    pub fn message_type(&self) -> EventSubMessageType {
        match self {
            Self::Welcome(_) => EventSubMessageType::Welcome,
            Self::Keepalive(_) => EventSubMessageType::Keepalive,
            Self::Notification(_) => EventSubMessageType::Notification,
            Self::Reconnect(_) => EventSubMessageType::Reconnect,
            Self::Revocation(_) => EventSubMessageType::Revocation,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Welcome(m) => &m.metadata,
            Self::Keepalive(m) => &m.metadata,
            Self::Notification(m) => &m.metadata,
            Self::Reconnect(m) => &m.metadata,
            Self::Revocation(m) => &m.metadata,
        }
    }
}

impl Dispatchable for EventSubMessage {
    type Kind = EventSubMessageType;

    fn kind(&self) -> EventSubMessageType {
        self.message_type()
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FormatError> {
    serde_json::from_value(value).map_err(|e| FormatError::InvalidJson(e.to_string()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub fn welcome(id: &str, keepalive: u64) -> String {
        format!(
            r#"{{"metadata":{{"message_id":"96a3f3b5-5dec-4eed-908e-e11ee657416c","message_type":"session_welcome","message_timestamp":"2023-07-19T14:56:51.634234626Z"}},"payload":{{"session":{{"id":"{id}","status":"connected","connected_at":"2023-07-19T14:56:51.616329898Z","keepalive_timeout_seconds":{keepalive},"reconnect_url":null}}}}}}"#
        )
    }

    pub fn reconnect(id: &str, url: &str) -> String {
        format!(
            r#"{{"metadata":{{"message_id":"84c1e79a-2a4b-4c13-ba0b-4312293e9308","message_type":"session_reconnect","message_timestamp":"2022-11-18T09:10:11.634234626Z"}},"payload":{{"session":{{"id":"{id}","status":"reconnecting","keepalive_timeout_seconds":null,"reconnect_url":"{url}","connected_at":"2022-11-16T10:11:12.634234626Z"}}}}}}"#
        )
    }

    pub const KEEPALIVE: &str = r#"{"metadata":{"message_id":"84c1e79a-2a4b-4c13-ba0b-4312293e9308","message_type":"session_keepalive","message_timestamp":"2023-07-19T10:11:12.634234626Z"},"payload":{}}"#;

    pub const NOTIFICATION: &str = r#"{"metadata":{"message_id":"befa7b53-d79d-478f-86b9-120f112b044e","message_type":"notification","message_timestamp":"2022-11-16T10:11:12.464757833Z","subscription_type":"channel.follow","subscription_version":"2"},"payload":{"subscription":{"id":"f1c2a387-161a-49f9-a165-0f21d7a4e1c4","status":"enabled","type":"channel.follow","version":"2","cost":0,"condition":{"broadcaster_user_id":"12826","moderator_user_id":"12826"},"transport":{"method":"websocket","session_id":"123456789"},"created_at":"2022-11-16T10:11:12.464757833Z"},"event":{"user_id":"1337","user_login":"awesome_user","user_name":"Awesome_User","broadcaster_user_id":"12826","broadcaster_user_login":"twitch","broadcaster_user_name":"Twitch","followed_at":"2023-07-15T18:16:11.17106713Z"}}}"#;

    pub const REVOCATION: &str = r#"{"metadata":{"message_id":"84c1e79a-2a4b-4c13-ba0b-4312293e9308","message_type":"revocation","message_timestamp":"2022-11-16T10:11:12.464757833Z","subscription_type":"channel.follow","subscription_version":"1"},"payload":{"subscription":{"id":"f1c2a387-161a-49f9-a165-0f21d7a4e1c4","status":"authorization_revoked","type":"channel.follow","version":"1","cost":1,"condition":{"broadcaster_user_id":"12826"},"transport":{"method":"websocket","session_id":"AQoQexAWVYKSTIu4ec_2VAxyuhAB"},"created_at":"2022-11-16T10:11:12.464757833Z"}}}"#;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_welcome() {
        let msg = EventSubMessage::parse(&fixtures::welcome("AQoQexAWVYKSTIu4ec_2VAxyuhAB", 10))
            .unwrap();
        let EventSubMessage::Welcome(welcome) = msg else {
            panic!("expected welcome");
        };
        assert_eq!(welcome.metadata.message_id, "96a3f3b5-5dec-4eed-908e-e11ee657416c");
        let ts = welcome.metadata.message_timestamp;
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 7, 19));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (14, 56, 51));
        assert_eq!(ts.timestamp_subsec_millis(), 634);

        let session = welcome.session();
        assert_eq!(session.id, "AQoQexAWVYKSTIu4ec_2VAxyuhAB");
        assert_eq!(session.keepalive_timeout_seconds, Some(10));
        assert_eq!(session.reconnect_url, None);
    }

    #[test]
    fn test_parse_keepalive() {
        let msg = EventSubMessage::parse(fixtures::KEEPALIVE).unwrap();
        assert_eq!(msg.message_type(), EventSubMessageType::Keepalive);
        let EventSubMessage::Keepalive(keepalive) = msg else {
            panic!("expected keepalive");
        };
        assert!(keepalive.payload.is_empty());
    }

    #[test]
    fn test_parse_notification() {
        let msg = EventSubMessage::parse(fixtures::NOTIFICATION).unwrap();
        let EventSubMessage::Notification(notification) = msg else {
            panic!("expected notification");
        };
        assert_eq!(
            notification.metadata.subscription_type.as_deref(),
            Some("channel.follow")
        );
        let sub = notification.subscription();
        assert_eq!(sub.kind, "channel.follow");
        assert_eq!(sub.cost, 0);
        assert_eq!(sub.transport.method, "websocket");
        assert_eq!(sub.transport.session_id.as_deref(), Some("123456789"));
        assert_eq!(notification.event()["user_login"], "awesome_user");

        #[derive(Deserialize)]
        struct Follow {
            user_name: String,
        }
        let follow: Follow = notification.event_as().unwrap();
        assert_eq!(follow.user_name, "Awesome_User");
    }

    #[test]
    fn test_parse_reconnect() {
        let msg =
            EventSubMessage::parse(&fixtures::reconnect("old", "wss://eventsub.wss.twitch.tv?...")).unwrap();
        let EventSubMessage::Reconnect(reconnect) = msg else {
            panic!("expected reconnect");
        };
        assert_eq!(reconnect.session().status, "reconnecting");
        assert_eq!(reconnect.session().keepalive_timeout_seconds, None);
        assert_eq!(
            reconnect.session().reconnect_url.as_deref(),
            Some("wss://eventsub.wss.twitch.tv?...")
        );
    }

    #[test]
    fn test_parse_revocation() {
        let msg = EventSubMessage::parse(fixtures::REVOCATION).unwrap();
        let EventSubMessage::Revocation(revocation) = msg else {
            panic!("expected revocation");
        };
        assert_eq!(revocation.subscription().status, "authorization_revoked");
        assert_eq!(revocation.subscription().cost, 1);
        assert_eq!(revocation.metadata.subscription_version.as_deref(), Some("1"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let text = r#"{"metadata":{"message_id":"x","message_type":"session_party","message_timestamp":"2023-07-19T10:11:12Z"},"payload":{}}"#;
        assert_eq!(
            EventSubMessage::parse(text),
            Err(FormatError::UnknownMessageType("session_party".to_string()))
        );
    }

    #[test]
    fn test_missing_discriminator_is_rejected() {
        assert!(matches!(
            EventSubMessage::parse(r#"{"payload":{}}"#),
            Err(FormatError::InvalidJson(_))
        ));
        assert!(matches!(
            EventSubMessage::parse("not json"),
            Err(FormatError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let text = r#"{"metadata":{"message_id":"x","message_type":"notification","message_timestamp":"2023-07-19T10:11:12Z"},"payload":{}}"#;
        assert!(matches!(
            EventSubMessage::parse(text),
            Err(FormatError::InvalidJson(_))
        ));
    }
}
