//! EventSub session tracking.
//!
//! A [`Session`] is created from a welcome and replaced wholesale when the
//! server moves the client to a new connection. Readers take an
//! `Arc<Session>` snapshot, so a swap never exposes a half-updated session.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::message::SessionPayload;
use crate::error::{ChatwireError, Result};

/// EventSub connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingWelcome,
    /// Usable for subscriptions under the given session id.
    Ready(String),
    /// Moving to a new connection; the named session is still current.
    Reconnecting(String),
    Closed,
}

/// Subscription quota reported by the REST API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub total: u32,
    pub total_cost: u32,
    pub max_total_cost: u32,
}

/// One EventSub session, as advertised by a welcome.
#[derive(Debug)]
pub struct Session {
    id: String,
    status: String,
    keepalive_timeout: Option<Duration>,
    reconnect_url: Option<String>,
    connected_at: DateTime<Utc>,
    quota: Mutex<Quota>,
}

impl Session {
    pub fn from_payload(payload: &SessionPayload) -> Self {
        Self {
            id: payload.id.clone(),
            status: payload.status.clone(),
            keepalive_timeout: payload.keepalive_timeout_seconds.map(Duration::from_secs),
            reconnect_url: payload.reconnect_url.clone(),
            connected_at: payload.connected_at,
            quota: Mutex::new(Quota::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Longest gap the server allows between messages.
    pub fn keepalive_timeout(&self) -> Option<Duration> {
        self.keepalive_timeout
    }

    pub fn reconnect_url(&self) -> Option<&str> {
        self.reconnect_url.as_deref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn quota(&self) -> Quota {
        *self.quota.lock()
    }

    /// Record quota counters returned by a subscription REST call.
    pub fn update_quota(&self, quota: Quota) {
        *self.quota.lock() = quota;
    }
}

/// Transport section of a subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionTransport {
    pub method: String,
    pub session_id: String,
}

/// Body of a subscription creation request, bound to one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub condition: BTreeMap<String, String>,
    pub transport: SubscriptionTransport,
}

impl SubscriptionRequest {
    /// Start a request for `kind` at `version` against `session`.
    pub fn new(session: &Session, kind: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: version.into(),
            condition: BTreeMap::new(),
            transport: SubscriptionTransport {
                method: "websocket".to_string(),
                session_id: session.id.clone(),
            },
        }
    }

    /// Add a condition field such as `broadcaster_user_id`.
    pub fn condition(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition.insert(key.into(), value.into());
        self
    }

    pub fn session_id(&self) -> &str {
        &self.transport.session_id
    }

    /// Serialize as the JSON request body.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Holder of the current session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    /// Install a new session and return the one it replaced.
    pub fn replace(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        self.current.write().replace(session)
    }

    pub fn clear(&self) -> Option<Arc<Session>> {
        self.current.write().take()
    }

    /// Create a request bound to the current session.
    pub fn request(
        &self,
        kind: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<SubscriptionRequest> {
        let session = self.current().ok_or(ChatwireError::NotReady)?;
        Ok(SubscriptionRequest::new(&session, kind, version))
    }

    /// Check that `request` still targets the current session.
    pub fn validate(&self, request: &SubscriptionRequest) -> Result<()> {
        let session = self.current().ok_or(ChatwireError::NotReady)?;
        if session.id() != request.session_id() {
            return Err(ChatwireError::StaleSession {
                requested: request.session_id().to_string(),
                current: session.id().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Arc<Session> {
        Arc::new(Session::from_payload(&SessionPayload {
            id: id.to_string(),
            status: "connected".to_string(),
            keepalive_timeout_seconds: Some(10),
            reconnect_url: None,
            connected_at: Utc::now(),
        }))
    }

    #[test]
    fn test_session_from_payload() {
        let session = session("abc");
        assert_eq!(session.id(), "abc");
        assert_eq!(session.status(), "connected");
        assert_eq!(session.keepalive_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(session.reconnect_url(), None);
        assert_eq!(session.quota(), Quota::default());
    }

    #[test]
    fn test_request_body() {
        let session = session("AQoQexAWVYKSTIu4ec_2VAxyuhAB");
        let request = SubscriptionRequest::new(&session, "channel.follow", "2")
            .condition("broadcaster_user_id", "12826")
            .condition("moderator_user_id", "12826");

        let body: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(body["type"], "channel.follow");
        assert_eq!(body["version"], "2");
        assert_eq!(body["condition"]["broadcaster_user_id"], "12826");
        assert_eq!(body["transport"]["method"], "websocket");
        assert_eq!(body["transport"]["session_id"], "AQoQexAWVYKSTIu4ec_2VAxyuhAB");
    }

    #[test]
    fn test_slot_rejects_before_welcome() {
        let slot = SessionSlot::new();
        assert!(matches!(
            slot.request("channel.follow", "2"),
            Err(ChatwireError::NotReady)
        ));
    }

    #[test]
    fn test_stale_request_after_swap() {
        let slot = SessionSlot::new();
        slot.replace(session("first"));
        let request = slot.request("channel.follow", "2").unwrap();
        assert!(slot.validate(&request).is_ok());

        let old = slot.replace(session("second"));
        assert_eq!(old.unwrap().id(), "first");

        match slot.validate(&request) {
            Err(ChatwireError::StaleSession { requested, current }) => {
                assert_eq!(requested, "first");
                assert_eq!(current, "second");
            }
            other => panic!("expected StaleSession, got {other:?}"),
        }
    }

    #[test]
    fn test_quota_update_is_per_session() {
        let slot = SessionSlot::new();
        slot.replace(session("first"));
        let quota = Quota {
            total: 3,
            total_cost: 2,
            max_total_cost: 10,
        };
        slot.current().unwrap().update_quota(quota);
        assert_eq!(slot.current().unwrap().quota(), quota);

        slot.replace(session("second"));
        assert_eq!(slot.current().unwrap().quota(), Quota::default());
    }
}
