//! Chat line parsing.
//!
//! Implements the subset of IRC used by the platform's chat service:
//!
//! ```text
//! [@tags ][:prefix ]COMMAND[ middle params][ :trailing param]
//! ```
//!
//! Parsing is pure and never coerces tag values; see [`crate::irc::typed`]
//! for the typed views layered on top.

use std::fmt;

use super::tags::Tags;
use crate::dispatch::Dispatchable;
use crate::error::FormatError;

/// Closed set of chat commands.
///
/// Lookup is exact and case-sensitive. Anything else maps to
/// [`Command::Unknown`], so the mapping never fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Privmsg,
    Ping,
    Pong,
    Join,
    Part,
    Notice,
    UserNotice,
    UserState,
    GlobalUserState,
    RoomState,
    ClearChat,
    ClearMsg,
    HostTarget,
    Whisper,
    Reconnect,
    Cap,
    /// `001`
    RplWelcome,
    /// `002`
    RplYourHost,
    /// `003`
    RplCreated,
    /// `004`
    RplMyInfo,
    /// `353`
    RplNamReply,
    /// `366`
    RplEndOfNames,
    /// `372`
    RplMotd,
    /// `375`
    RplMotdStart,
    /// `376`
    RplEndOfMotd,
    /// `421`
    ErrUnknownCommand,
    /// Any command word not listed above.
    Unknown(String),
}

impl Command {
    /// Map a command word to its variant.
    pub fn parse(word: &str) -> Self {
        match word {
            "PRIVMSG" => Command::Privmsg,
            "PING" => Command::Ping,
            "PONG" => Command::Pong,
            "JOIN" => Command::Join,
            "PART" => Command::Part,
            "NOTICE" => Command::Notice,
            "USERNOTICE" => Command::UserNotice,
            "USERSTATE" => Command::UserState,
            "GLOBALUSERSTATE" => Command::GlobalUserState,
            "ROOMSTATE" => Command::RoomState,
            "CLEARCHAT" => Command::ClearChat,
            "CLEARMSG" => Command::ClearMsg,
            "HOSTTARGET" => Command::HostTarget,
            "WHISPER" => Command::Whisper,
            "RECONNECT" => Command::Reconnect,
            "CAP" => Command::Cap,
            "001" => Command::RplWelcome,
            "002" => Command::RplYourHost,
            "003" => Command::RplCreated,
            "004" => Command::RplMyInfo,
            "353" => Command::RplNamReply,
            "366" => Command::RplEndOfNames,
            "372" => Command::RplMotd,
            "375" => Command::RplMotdStart,
            "376" => Command::RplEndOfMotd,
            "421" => Command::ErrUnknownCommand,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// The wire form of this command.
    pub fn as_str(&self) -> &str {
        match self {
            Command::Privmsg => "PRIVMSG",
            Command::Ping => "PING",
            Command::Pong => "PONG",
            Command::Join => "JOIN",
            Command::Part => "PART",
            Command::Notice => "NOTICE",
            Command::UserNotice => "USERNOTICE",
            Command::UserState => "USERSTATE",
            Command::GlobalUserState => "GLOBALUSERSTATE",
            Command::RoomState => "ROOMSTATE",
            Command::ClearChat => "CLEARCHAT",
            Command::ClearMsg => "CLEARMSG",
            Command::HostTarget => "HOSTTARGET",
            Command::Whisper => "WHISPER",
            Command::Reconnect => "RECONNECT",
            Command::Cap => "CAP",
            Command::RplWelcome => "001",
            Command::RplYourHost => "002",
            Command::RplCreated => "003",
            Command::RplMyInfo => "004",
            Command::RplNamReply => "353",
            Command::RplEndOfNames => "366",
            Command::RplMotd => "372",
            Command::RplMotdStart => "375",
            Command::RplEndOfMotd => "376",
            Command::ErrUnknownCommand => "421",
            Command::Unknown(word) => word,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    command: Command,
    prefix: Option<String>,
    params: Vec<String>,
    tags: Tags,
    raw: String,
}

impl Message {
    /// Parse one line without its CRLF terminator.
    pub fn parse(line: &str) -> Result<Self, FormatError> {
        let mut rest = line;

        let tags = match rest.strip_prefix('@') {
            Some(after) => {
                let (section, remainder) = after
                    .split_once(' ')
                    .ok_or(FormatError::UnterminatedTags)?;
                rest = remainder.trim_start_matches(' ');
                Tags::parse(section)?
            }
            None => Tags::new(),
        };

        let prefix = match rest.strip_prefix(':') {
            Some(after) => {
                let (prefix, remainder) = after
                    .split_once(' ')
                    .ok_or(FormatError::UnterminatedPrefix)?;
                rest = remainder.trim_start_matches(' ');
                Some(prefix.to_string())
            }
            None => None,
        };

        let (word, args) = match rest.split_once(' ') {
            Some((word, args)) => (word, Some(args)),
            None => (rest, None),
        };
        if word.is_empty() {
            return Err(FormatError::MissingCommand);
        }

        let mut params = Vec::new();
        if let Some(args) = args {
            if let Some(trailing) = args.strip_prefix(':') {
                params.push(trailing.to_string());
            } else {
                let (middle, trailing) = match args.split_once(" :") {
                    Some((middle, trailing)) => (middle, Some(trailing)),
                    None => (args, None),
                };
                params.extend(
                    middle
                        .split(' ')
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                );
                if let Some(trailing) = trailing {
                    params.push(trailing.to_string());
                }
            }
        }

        Ok(Self {
            command: Command::parse(word),
            prefix,
            params,
            tags,
            raw: line.to_string(),
        })
    }

    /// The message type.
    #[inline]
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// The `:prefix` section, without the colon.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The nick part of a `nick!user@host` prefix, or `""`.
    pub fn nick(&self) -> &str {
        self.prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .unwrap_or("")
    }

    /// All parameters, trailing parameter last.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Parameter at `index`, or `""`.
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).map(String::as_str).unwrap_or("")
    }

    /// Last parameter, or `""`.
    pub fn last_param(&self) -> &str {
        self.params.last().map(String::as_str).unwrap_or("")
    }

    /// Parsed tags.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Tag value, or `""` when absent.
    pub fn tag(&self, key: &str) -> &str {
        self.tags.get_or_empty(key)
    }

    /// The unparsed line.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Dispatchable for Message {
    type Kind = Command;

    fn kind(&self) -> Command {
        self.command.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOMSTATE: &str = "@emote-only=0;followers-only=-1;r9k=0;room-id=321654987;slow=0;subs-only=0 :tmi.twitch.tv ROOMSTATE #channelname";

    #[test]
    fn test_roomstate_line() {
        let msg = Message::parse(ROOMSTATE).unwrap();
        assert_eq!(msg.command(), &Command::RoomState);
        assert_eq!(msg.prefix(), Some("tmi.twitch.tv"));
        assert_eq!(msg.params(), ["#channelname"]);
        assert_eq!(msg.tag("room-id"), "321654987");
        assert_eq!(msg.tags().len(), 6);
        assert_eq!(msg.raw(), ROOMSTATE);
    }

    #[test]
    fn test_parse_is_pure() {
        let a = Message::parse(ROOMSTATE).unwrap();
        let b = Message::parse(ROOMSTATE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_join_prefix() {
        let msg = Message::parse(":newuser!newuser@newuser.tmi.twitch.tv JOIN #channelname").unwrap();
        assert_eq!(msg.command(), &Command::Join);
        assert_eq!(msg.nick(), "newuser");
        assert_eq!(msg.params(), ["#channelname"]);
        assert!(msg.tags().is_empty());
    }

    #[test]
    fn test_trailing_param_preserved() {
        let msg = Message::parse(
            ":u!u@u.tmi.twitch.tv PRIVMSG #channelname :This includes a cheer Cheer100",
        )
        .unwrap();
        assert_eq!(msg.params(), ["#channelname", "This includes a cheer Cheer100"]);
    }

    #[test]
    fn test_trailing_param_with_colons() {
        let msg = Message::parse("PRIVMSG #c :time is 12:30 :) ok").unwrap();
        assert_eq!(msg.last_param(), "time is 12:30 :) ok");
        assert_eq!(msg.params().len(), 2);
    }

    #[test]
    fn test_whole_remainder_trailing() {
        let msg = Message::parse("PING :tmi.twitch.tv").unwrap();
        assert_eq!(msg.command(), &Command::Ping);
        assert_eq!(msg.params(), ["tmi.twitch.tv"]);
        assert_eq!(msg.prefix(), None);
    }

    #[test]
    fn test_numeric_namreply() {
        let msg = Message::parse(
            ":justinfan7550.tmi.twitch.tv 353 justinfan7550 = #channelname :user1 user2 user3",
        )
        .unwrap();
        assert_eq!(msg.command(), &Command::RplNamReply);
        assert_eq!(
            msg.params(),
            ["justinfan7550", "=", "#channelname", "user1 user2 user3"]
        );
    }

    #[test]
    fn test_unknown_command_is_not_an_error() {
        let msg = Message::parse(":tmi.twitch.tv FOOBAR a b").unwrap();
        assert_eq!(msg.command(), &Command::Unknown("FOOBAR".to_string()));
        assert_eq!(msg.command().as_str(), "FOOBAR");
        assert_eq!(msg.params(), ["a", "b"]);
    }

    #[test]
    fn test_command_lookup_is_case_sensitive() {
        assert_eq!(Command::parse("privmsg"), Command::Unknown("privmsg".to_string()));
        assert_eq!(Command::parse("PRIVMSG"), Command::Privmsg);
    }

    #[test]
    fn test_command_without_params() {
        let msg = Message::parse(":tmi.twitch.tv RECONNECT").unwrap();
        assert_eq!(msg.command(), &Command::Reconnect);
        assert!(msg.params().is_empty());
        assert_eq!(msg.last_param(), "");
    }

    #[test]
    fn test_empty_tag_section() {
        let msg = Message::parse("@ :tmi.twitch.tv PING :x").unwrap();
        assert!(msg.tags().is_empty());
        assert_eq!(msg.command(), &Command::Ping);
    }

    #[test]
    fn test_missing_delimiters() {
        assert_eq!(
            Message::parse("@a=b;c=d"),
            Err(FormatError::UnterminatedTags)
        );
        assert_eq!(
            Message::parse(":tmi.twitch.tv"),
            Err(FormatError::UnterminatedPrefix)
        );
        assert_eq!(Message::parse("@a=b "), Err(FormatError::MissingCommand));
        assert_eq!(Message::parse(""), Err(FormatError::MissingCommand));
    }

    #[test]
    fn test_bad_tag_surfaces_as_error() {
        assert_eq!(
            Message::parse("@a=x\0y PING :x"),
            Err(FormatError::InvalidTagCharacter('\0'))
        );
    }
}
