//! PubSub message envelope.
//!
//! Frames are JSON objects with a `type` discriminator and optional `data`,
//! `nonce` and `error` members. Topic payloads stay as raw JSON.

use std::fmt::Write as _;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dispatch::Dispatchable;
use crate::error::{FormatError, Result};

/// Random bytes in a generated nonce.
const NONCE_BYTES: usize = 32;

/// PubSub message type. Types outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubKind {
    Ping,
    Pong,
    Listen,
    Unlisten,
    Response,
    Message,
    Reconnect,
    Other(String),
}

impl PubSubKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "PING" => Self::Ping,
            "PONG" => Self::Pong,
            "LISTEN" => Self::Listen,
            "UNLISTEN" => Self::Unlisten,
            "RESPONSE" => Self::Response,
            "MESSAGE" => Self::Message,
            "RECONNECT" => Self::Reconnect,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::Listen => "LISTEN",
            Self::Unlisten => "UNLISTEN",
            Self::Response => "RESPONSE",
            Self::Message => "MESSAGE",
            Self::Reconnect => "RECONNECT",
            Self::Other(s) => s,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// One PubSub frame, inbound or outbound.
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubMessage {
    kind: PubSubKind,
    data: Option<Value>,
    nonce: Option<String>,
    error: Option<String>,
}

impl PubSubMessage {
    pub fn new(kind: PubSubKind) -> Self {
        Self {
            kind,
            data: None,
            nonce: None,
            error: None,
        }
    }

    /// Parse one complete WebSocket text message.
    pub fn parse(text: &str) -> std::result::Result<Self, FormatError> {
        let wire: Wire =
            serde_json::from_str(text).map_err(|e| FormatError::InvalidJson(e.to_string()))?;
        Ok(Self {
            kind: PubSubKind::parse(&wire.kind),
            data: wire.data,
            nonce: wire.nonce,
            error: wire.error,
        })
    }

    pub fn ping() -> Self {
        Self::new(PubSubKind::Ping)
    }

    /// Subscribe to `topics`.
    pub fn listen<I, S>(topics: I, auth_token: Option<&str>, nonce: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
        let data = match auth_token {
            Some(token) => json!({ "topics": topics, "auth_token": token }),
            None => json!({ "topics": topics }),
        };
        Self::new(PubSubKind::Listen)
            .with_data(data)
            .with_nonce(nonce)
    }

    /// Unsubscribe from `topics`.
    pub fn unlisten<I, S>(topics: I, nonce: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
        Self::new(PubSubKind::Unlisten)
            .with_data(json!({ "topics": topics }))
            .with_nonce(nonce)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn kind(&self) -> &PubSubKind {
        &self.kind
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Error string of a RESPONSE. Empty means success.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `true` for a RESPONSE that reports no error.
    pub fn is_success(&self) -> bool {
        self.kind == PubSubKind::Response && self.error.as_deref().unwrap_or("").is_empty()
    }

    /// Topic of a MESSAGE.
    pub fn topic(&self) -> Option<&str> {
        self.data.as_ref()?.get("topic")?.as_str()
    }

    /// Body of a MESSAGE, itself a JSON document encoded as a string.
    pub fn body(&self) -> Option<&str> {
        self.data.as_ref()?.get("message")?.as_str()
    }

    pub fn to_json(&self) -> Result<String> {
        let wire = Wire {
            kind: self.kind.as_str().to_string(),
            nonce: self.nonce.clone(),
            error: self.error.clone(),
            data: self.data.clone(),
        };
        Ok(serde_json::to_string(&wire)?)
    }
}

impl Dispatchable for PubSubMessage {
    type Kind = PubSubKind;

    fn kind(&self) -> PubSubKind {
        self.kind.clone()
    }
}

/// Random request nonce: 32 bytes, upper-case hex.
pub fn make_nonce<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rng.fill(&mut bytes[..]);
    bytes.iter().fold(String::with_capacity(NONCE_BYTES * 2), |mut s, b| {
        let _ = write!(s, "{b:02X}");
        s
    })
}
