//! Chat protocol.
//!
//! IRC-derived text lines over a caller-supplied byte stream:
//! - [`Tags`] and [`Message`]: pure line parsing
//! - [`typed`]: lazily evaluated views over parsed messages
//! - [`IrcClient`]: connection loop, login, room state and membership

mod connection;
mod membership;
mod message;
mod tags;
pub mod typed;

pub use connection::{anonymous_nick, pong_for, ConnectionState, IrcClient, IrcClientBuilder};
pub use membership::{MembershipBatcher, Presence};
pub use message::{Command, Message};
pub use tags::Tags;
pub use typed::{
    Badge, ClearChat, ClearMsg, Emote, GlobalUserState, HostTarget, Join, NamReply, Notice, Part,
    Privmsg, RoomState, Rgb, TypedMessage, UserNotice, UserState, UserType, Whisper,
};
