//! # chatwire
//!
//! Client library for a live-streaming platform's real-time protocols:
//! the IRC-derived chat protocol, EventSub WebSocket sessions and PubSub
//! WebSocket topics.
//!
//! ## Architecture
//!
//! Every protocol runs the same pipeline on its own tasks:
//!
//! - **Framing**: transport bytes to whole units ([`framing`])
//! - **Parsing**: units to typed messages ([`irc`], [`eventsub`], [`pubsub`])
//! - **Dispatch**: system callbacks then user callbacks, in receipt order,
//!   off the read loop ([`dispatch`])
//! - **Liveness**: silence detection and heartbeats ([`liveness`])
//! - **Rate limiting**: a shared token pool gating user sends ([`RateLimiter`])
//!
//! Connection-level happenings (timeouts, membership batches, session
//! changes, disconnects) are published on each client's `events()` channel.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use chatwire::irc::{Command, IrcClient, Message};
//! use chatwire::RateLimiter;
//!
//! #[tokio::main]
//! async fn main() -> chatwire::Result<()> {
//!     let stream = tokio::net::TcpStream::connect("irc.chat.twitch.tv:6667").await?;
//!     let client = IrcClient::builder()
//!         .rate_limiter(RateLimiter::new(20, Duration::from_secs(30)))
//!         .callback(Some(vec![Command::Privmsg]), |msg: Arc<Message>| async move {
//!             println!("{}: {}", msg.nick(), msg.last_param());
//!             Ok(())
//!         })
//!         .connect(stream);
//!
//!     client.authenticate(None, None).await?;
//!     client.join_channel("somechannel").await?;
//!     client.wait_for_shutdown().await
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod eventsub;
pub mod framing;
pub mod irc;
pub mod liveness;
pub mod pubsub;
pub mod ratelimit;
pub mod writer;
pub mod ws;

pub use error::{ChatwireError, FormatError, Result};
pub use event::ConnectionEvent;
pub use ratelimit::RateLimiter;
