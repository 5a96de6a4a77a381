//! IRCv3 message tags.
//!
//! Tag names are case-sensitive. Client prefixes and vendors are kept as
//! part of the key, so `+example.com/foo` and `foo` are distinct tags.
//!
//! # Example
//!
//! ```
//! use chatwire::irc::Tags;
//!
//! let tags = Tags::parse(r"room-id=12;msg=hello\sworld;vip").unwrap();
//! assert_eq!(tags.get("room-id"), Some("12"));
//! assert_eq!(tags.get("msg"), Some("hello world"));
//! assert_eq!(tags.get("vip"), Some(""));
//! assert_eq!(tags.get("missing"), None);
//! ```

use std::collections::HashMap;

use crate::error::FormatError;

/// Parser state for the tag grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading a key, up to `=` or `;`.
    Key,
    /// Reading an unescaped value character.
    Value,
    /// The previous value character was `\`.
    Escaped,
}

/// Parsed tag set.
///
/// Values are always the raw decoded strings; coercion into numbers,
/// booleans or timestamps is left to the typed message views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    inner: HashMap<String, String>,
}

impl Tags {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tag section without its leading `@` or trailing space.
    ///
    /// A key without `=` maps to `""`. Duplicate keys keep the last value.
    pub fn parse(s: &str) -> Result<Self, FormatError> {
        let mut tags = Tags::new();
        let mut key = String::new();
        let mut value = String::new();
        let mut state = State::Key;

        for c in s.chars() {
            match state {
                State::Key => match c {
                    '=' => state = State::Value,
                    ';' => tags.finish_pair(&mut key, &mut value),
                    _ => key.push(c),
                },
                State::Value => match c {
                    '\\' => state = State::Escaped,
                    ';' => {
                        tags.finish_pair(&mut key, &mut value);
                        state = State::Key;
                    }
                    '\r' | '\n' | '\0' => return Err(FormatError::InvalidTagCharacter(c)),
                    _ => value.push(c),
                },
                State::Escaped => {
                    match c {
                        ':' => value.push(';'),
                        's' => value.push(' '),
                        '\\' => value.push('\\'),
                        'r' => value.push('\r'),
                        'n' => value.push('\n'),
                        '\r' | '\n' | '\0' => return Err(FormatError::InvalidTagCharacter(c)),
                        other => value.push(other),
                    }
                    state = State::Value;
                }
            }
        }

        // A dangling `\` at the end of input is dropped.
        tags.finish_pair(&mut key, &mut value);
        Ok(tags)
    }

    fn finish_pair(&mut self, key: &mut String, value: &mut String) {
        if key.is_empty() {
            value.clear();
            return;
        }
        self.inner
            .insert(std::mem::take(key), std::mem::take(value));
    }

    /// Get a tag value. `Some("")` means present without a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// Get a tag value, or `""` when absent.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Check whether a tag is present, with or without a value.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over `(key, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert or replace a tag.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into());
    }
}
