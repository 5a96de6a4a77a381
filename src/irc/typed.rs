//! Typed views over parsed chat messages.
//!
//! Each view wraps a [`Message`] and computes its accessors on demand from
//! the raw tags and parameters. Accessors never fail: a missing or
//! malformed tag resolves to the documented default.
//!
//! The view is chosen once, from the command alone, by
//! [`TypedMessage::from`].

use std::ops::Deref;

use chrono::{DateTime, Utc};

use super::message::{Command, Message};

/// An RGB name color from the `color` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `#RRGGBB`. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// A chat badge and its version, e.g. `subscriber/9`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub name: String,
    pub version: String,
}

/// One emote occurrence in a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emote {
    pub id: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Length in characters.
    pub length: usize,
}

/// Site-wide user type. Unknown or missing values are `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserType {
    #[default]
    Normal,
    Admin,
    GlobalMod,
    Staff,
}

fn flag(msg: &Message, key: &str) -> bool {
    msg.tag(key) == "1"
}

fn int_or(msg: &Message, key: &str, default: i64) -> i64 {
    msg.tag(key).parse().unwrap_or(default)
}

fn channel_name(param: &str) -> &str {
    param.trim_start_matches('#')
}

fn color(msg: &Message) -> Option<Rgb> {
    Rgb::parse(msg.tag("color"))
}

fn badges(msg: &Message, key: &str) -> Vec<Badge> {
    msg.tag(key)
        .split(',')
        .filter(|b| !b.is_empty())
        .map(|b| {
            let (name, version) = b.split_once('/').unwrap_or((b, ""));
            Badge {
                name: name.to_string(),
                version: version.to_string(),
            }
        })
        .collect()
}

fn emotes(msg: &Message) -> Vec<Emote> {
    let mut out = Vec::new();
    for group in msg.tag("emotes").split('/').filter(|g| !g.is_empty()) {
        let Some((id, ranges)) = group.split_once(':') else {
            continue;
        };
        for range in ranges.split(',') {
            let Some((start, end)) = range.split_once('-') else {
                continue;
            };
            if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                if end >= start {
                    out.push(Emote {
                        id: id.to_string(),
                        start,
                        length: end - start + 1,
                    });
                }
            }
        }
    }
    out
}

fn user_type(msg: &Message) -> UserType {
    match msg.tag("user-type") {
        "admin" => UserType::Admin,
        "global_mod" => UserType::GlobalMod,
        "staff" => UserType::Staff,
        _ => UserType::Normal,
    }
}

fn sent_at(msg: &Message) -> Option<DateTime<Utc>> {
    msg.tag("tmi-sent-ts")
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

fn emote_sets(msg: &Message) -> Vec<String> {
    msg.tag("emote-sets")
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

macro_rules! view {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(Message);

        impl $name {
            /// Unwrap the underlying message.
            pub fn into_inner(self) -> Message {
                self.0
            }
        }

        impl Deref for $name {
            type Target = Message;

            fn deref(&self) -> &Message {
                &self.0
            }
        }
    };
}

view!(
    /// `ROOMSTATE`: the channel's chat settings.
    RoomState
);

impl RoomState {
    /// Emote-only mode. Default `false`.
    pub fn emote_only(&self) -> bool {
        flag(self, "emote-only")
    }

    /// Minutes a user must follow before chatting; `-1` when the room is
    /// not follower-only. Default `-1`.
    pub fn followers_only(&self) -> i64 {
        int_or(self, "followers-only", -1)
    }

    /// Unique-message (r9k) mode. Default `false`.
    pub fn unique_mode(&self) -> bool {
        flag(self, "r9k")
    }

    /// Channel ID. Default `""`.
    pub fn room_id(&self) -> &str {
        self.tag("room-id")
    }

    /// Seconds between messages. Default `0`.
    pub fn slow(&self) -> i64 {
        int_or(self, "slow", 0)
    }

    /// Subscriber-only mode. Default `false`.
    pub fn subs_only(&self) -> bool {
        flag(self, "subs-only")
    }

    pub fn channel_name(&self) -> &str {
        channel_name(self.last_param())
    }
}

view!(
    /// `JOIN`: a user entered the channel.
    Join
);

impl Join {
    pub fn username(&self) -> &str {
        self.nick()
    }

    pub fn channel_name(&self) -> &str {
        channel_name(self.param(0))
    }
}

view!(
    /// `PART`: a user left the channel.
    Part
);

impl Part {
    pub fn username(&self) -> &str {
        self.nick()
    }

    pub fn channel_name(&self) -> &str {
        channel_name(self.param(0))
    }
}

view!(
    /// `353`: a page of the channel's user list.
    NamReply
);

impl NamReply {
    pub fn channel_name(&self) -> &str {
        let params = self.params();
        match params.len() {
            0 | 1 => "",
            n => channel_name(&params[n - 2]),
        }
    }

    pub fn users(&self) -> Vec<String> {
        self.last_param()
            .split(' ')
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }
}

view!(
    /// `PRIVMSG`: a chat message.
    Privmsg
);

impl Privmsg {
    /// Raw `badge-info` entries.
    pub fn badge_info(&self) -> Vec<Badge> {
        badges(self, "badge-info")
    }

    /// Total months subscribed, from `badge-info`. Default `0`.
    pub fn subscription_length(&self) -> u32 {
        self.badge_info()
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case("subscriber"))
            .and_then(|b| b.version.parse().ok())
            .unwrap_or(0)
    }

    pub fn badges(&self) -> Vec<Badge> {
        badges(self, "badges")
    }

    /// Bits cheered. Default `0`.
    pub fn bits(&self) -> u32 {
        self.tag("bits").parse().unwrap_or(0)
    }

    pub fn color(&self) -> Option<Rgb> {
        color(self)
    }

    pub fn display_name(&self) -> &str {
        self.tag("display-name")
    }

    pub fn emotes(&self) -> Vec<Emote> {
        emotes(self)
    }

    pub fn id(&self) -> &str {
        self.tag("id")
    }

    pub fn moderator(&self) -> bool {
        flag(self, "mod")
    }

    pub fn room_id(&self) -> &str {
        self.tag("room-id")
    }

    pub fn subscriber(&self) -> bool {
        flag(self, "subscriber")
    }

    /// Server timestamp from `tmi-sent-ts`.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        sent_at(self)
    }

    pub fn turbo(&self) -> bool {
        flag(self, "turbo")
    }

    pub fn user_id(&self) -> &str {
        self.tag("user-id")
    }

    pub fn user_type(&self) -> UserType {
        user_type(self)
    }

    /// VIP status is signalled by the tag's presence alone.
    pub fn vip(&self) -> bool {
        self.tags().contains("vip")
    }

    pub fn first_message(&self) -> bool {
        flag(self, "first-msg")
    }

    /// Hype Chat level 1-10, or `0` when this is not a Hype Chat.
    pub fn hype_chat_level(&self) -> u8 {
        const LEVELS: [&str; 10] = [
            "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE", "TEN",
        ];
        let value = self.tag("pinned-chat-paid-level").to_ascii_uppercase();
        LEVELS
            .iter()
            .position(|l| *l == value)
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }

    /// ISO 4217 currency of a Hype Chat.
    pub fn hype_chat_currency(&self) -> &str {
        self.tag("pinned-chat-paid-currency")
    }

    /// Hype Chat amount in major currency units.
    pub fn hype_chat_value(&self) -> Option<f64> {
        let amount: i64 = self.tag("pinned-chat-paid-amount").parse().ok()?;
        let exponent: i32 = self.tag("pinned-chat-paid-exponent").parse().ok()?;
        Some(amount as f64 / 10f64.powi(exponent))
    }

    pub fn channel_name(&self) -> &str {
        channel_name(self.param(0))
    }

    /// The message body.
    pub fn text(&self) -> &str {
        self.last_param()
    }
}

view!(
    /// `CLEARCHAT`: a ban, timeout or full chat clear.
    ClearChat
);

impl ClearChat {
    /// Timeout length in seconds; `0` for bans and clears.
    pub fn timeout_duration(&self) -> u64 {
        self.tag("ban-duration").parse().unwrap_or(0)
    }

    pub fn room_id(&self) -> &str {
        self.tag("room-id")
    }

    pub fn target_user_id(&self) -> &str {
        self.tag("target-user-id")
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        sent_at(self)
    }

    /// A permanent ban: a target without a duration.
    pub fn is_ban(&self) -> bool {
        self.tags().contains("target-user-id") && !self.tags().contains("ban-duration")
    }

    pub fn channel_name(&self) -> &str {
        channel_name(self.param(0))
    }

    /// Affected user, or `""` for a full clear.
    pub fn user(&self) -> &str {
        self.param(1)
    }
}

view!(
    /// `CLEARMSG`: a single message was deleted.
    ClearMsg
);

impl ClearMsg {
    pub fn login(&self) -> &str {
        self.tag("login")
    }

    pub fn room_id(&self) -> &str {
        self.tag("room-id")
    }

    pub fn target_message_id(&self) -> &str {
        self.tag("target-msg-id")
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        sent_at(self)
    }

    pub fn text(&self) -> &str {
        self.last_param()
    }
}

view!(
    /// `NOTICE`: a server notice.
    Notice
);

impl Notice {
    /// The `msg-id` tag, e.g. `slow_on`. Default `""`.
    pub fn msg_id(&self) -> &str {
        self.tag("msg-id")
    }

    pub fn target_user_id(&self) -> &str {
        self.tag("target-user-id")
    }

    pub fn text(&self) -> &str {
        self.last_param()
    }
}

view!(
    /// `USERSTATE`: our own state in a channel.
    UserState
);

impl UserState {
    pub fn channel_name(&self) -> &str {
        channel_name(self.param(0))
    }

    pub fn color(&self) -> Option<Rgb> {
        color(self)
    }

    pub fn display_name(&self) -> &str {
        self.tag("display-name")
    }

    pub fn emote_sets(&self) -> Vec<String> {
        emote_sets(self)
    }

    pub fn id(&self) -> &str {
        self.tag("id")
    }

    pub fn moderator(&self) -> bool {
        flag(self, "mod")
    }

    pub fn subscriber(&self) -> bool {
        flag(self, "subscriber")
    }

    pub fn turbo(&self) -> bool {
        flag(self, "turbo")
    }

    pub fn user_type(&self) -> UserType {
        user_type(self)
    }
}

view!(
    /// `GLOBALUSERSTATE`: our own state after login.
    GlobalUserState
);

impl GlobalUserState {
    pub fn badge_info(&self) -> Vec<Badge> {
        badges(self, "badge-info")
    }

    pub fn badges(&self) -> Vec<Badge> {
        badges(self, "badges")
    }

    pub fn color(&self) -> Option<Rgb> {
        color(self)
    }

    pub fn display_name(&self) -> &str {
        self.tag("display-name")
    }

    pub fn emote_sets(&self) -> Vec<String> {
        emote_sets(self)
    }

    pub fn turbo(&self) -> bool {
        flag(self, "turbo")
    }

    pub fn user_id(&self) -> &str {
        self.tag("user-id")
    }

    pub fn user_type(&self) -> UserType {
        user_type(self)
    }
}

view!(
    /// `USERNOTICE`: subs, raids, announcements and similar events.
    UserNotice
);

impl UserNotice {
    pub fn badges(&self) -> Vec<Badge> {
        badges(self, "badges")
    }

    pub fn color(&self) -> Option<Rgb> {
        color(self)
    }

    pub fn channel_name(&self) -> &str {
        channel_name(self.param(0))
    }

    /// Optional user-supplied text.
    pub fn text(&self) -> &str {
        self.param(1)
    }

    pub fn display_name(&self) -> &str {
        self.tag("display-name")
    }

    pub fn emotes(&self) -> Vec<Emote> {
        emotes(self)
    }

    pub fn id(&self) -> &str {
        self.tag("id")
    }

    /// Event kind, e.g. `sub`, `resub`, `raid`.
    pub fn msg_id(&self) -> &str {
        self.tag("msg-id")
    }

    pub fn login(&self) -> &str {
        self.tag("login")
    }

    pub fn moderator(&self) -> bool {
        flag(self, "mod")
    }

    pub fn room_id(&self) -> &str {
        self.tag("room-id")
    }

    pub fn subscriber(&self) -> bool {
        flag(self, "subscriber")
    }

    /// Server-rendered description of the event.
    pub fn system_message(&self) -> &str {
        self.tag("system-msg")
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        sent_at(self)
    }

    pub fn turbo(&self) -> bool {
        flag(self, "turbo")
    }

    pub fn user_id(&self) -> &str {
        self.tag("user-id")
    }

    pub fn user_type(&self) -> UserType {
        user_type(self)
    }
}

view!(
    /// `WHISPER`: a private message.
    Whisper
);

impl Whisper {
    pub fn badges(&self) -> Vec<Badge> {
        badges(self, "badges")
    }

    pub fn color(&self) -> Option<Rgb> {
        color(self)
    }

    pub fn display_name(&self) -> &str {
        self.tag("display-name")
    }

    pub fn emotes(&self) -> Vec<Emote> {
        emotes(self)
    }

    pub fn message_id(&self) -> &str {
        self.tag("message-id")
    }

    /// `<smaller-user-id>_<larger-user-id>`.
    pub fn thread_id(&self) -> &str {
        self.tag("thread-id")
    }

    pub fn turbo(&self) -> bool {
        flag(self, "turbo")
    }

    pub fn user_id(&self) -> &str {
        self.tag("user-id")
    }

    pub fn user_type(&self) -> UserType {
        user_type(self)
    }

    pub fn text(&self) -> &str {
        self.last_param()
    }
}

view!(
    /// `HOSTTARGET`: the channel started or stopped hosting.
    HostTarget
);

impl HostTarget {
    pub fn hosting_channel(&self) -> &str {
        channel_name(self.param(0))
    }

    /// Hosted channel, or `""` when hosting stopped.
    pub fn channel_being_hosted(&self) -> &str {
        let target = self.last_param().split(' ').next().unwrap_or("");
        if target == "-" {
            ""
        } else {
            target
        }
    }

    pub fn now_hosting(&self) -> bool {
        !self.last_param().starts_with('-')
    }

    /// Viewer count carried over. Default `0`.
    pub fn viewers(&self) -> u64 {
        self.last_param()
            .split(' ')
            .nth(1)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// A chat message with its view selected by command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedMessage {
    RoomState(RoomState),
    Join(Join),
    Part(Part),
    NamReply(NamReply),
    Privmsg(Privmsg),
    ClearChat(ClearChat),
    ClearMsg(ClearMsg),
    Notice(Notice),
    UserState(UserState),
    GlobalUserState(GlobalUserState),
    UserNotice(UserNotice),
    Whisper(Whisper),
    HostTarget(HostTarget),
    /// Commands without a dedicated view.
    Other(Message),
}

impl From<Message> for TypedMessage {
    fn from(msg: Message) -> Self {
        match msg.command() {
            Command::RoomState => TypedMessage::RoomState(RoomState(msg)),
            Command::Join => TypedMessage::Join(Join(msg)),
            Command::Part => TypedMessage::Part(Part(msg)),
            Command::RplNamReply => TypedMessage::NamReply(NamReply(msg)),
            Command::Privmsg => TypedMessage::Privmsg(Privmsg(msg)),
            Command::ClearChat => TypedMessage::ClearChat(ClearChat(msg)),
            Command::ClearMsg => TypedMessage::ClearMsg(ClearMsg(msg)),
            Command::Notice => TypedMessage::Notice(Notice(msg)),
            Command::UserState => TypedMessage::UserState(UserState(msg)),
            Command::GlobalUserState => TypedMessage::GlobalUserState(GlobalUserState(msg)),
            Command::UserNotice => TypedMessage::UserNotice(UserNotice(msg)),
            Command::Whisper => TypedMessage::Whisper(Whisper(msg)),
            Command::HostTarget => TypedMessage::HostTarget(HostTarget(msg)),
            _ => TypedMessage::Other(msg),
        }
    }
}

impl TypedMessage {
    /// Parse a line and select its view.
    pub fn parse(line: &str) -> Result<Self, crate::error::FormatError> {
        Message::parse(line).map(Self::from)
    }

    /// The underlying message.
    pub fn message(&self) -> &Message {
        match self {
            TypedMessage::RoomState(m) => &m.0,
            TypedMessage::Join(m) => &m.0,
            TypedMessage::Part(m) => &m.0,
            TypedMessage::NamReply(m) => &m.0,
            TypedMessage::Privmsg(m) => &m.0,
            TypedMessage::ClearChat(m) => &m.0,
            TypedMessage::ClearMsg(m) => &m.0,
            TypedMessage::Notice(m) => &m.0,
            TypedMessage::UserState(m) => &m.0,
            TypedMessage::GlobalUserState(m) => &m.0,
            TypedMessage::UserNotice(m) => &m.0,
            TypedMessage::Whisper(m) => &m.0,
            TypedMessage::HostTarget(m) => &m.0,
            TypedMessage::Other(m) => m,
        }
    }

    #[inline]
    pub fn command(&self) -> &Command {
        self.message().command()
    }
}
