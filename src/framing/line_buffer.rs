//! Line buffer for the chat protocol.
//!
//! Uses `bytes::BytesMut` to accumulate partial reads and splits on CR LF.
//! Implements a small state machine for overlong lines:
//! - `Line`: accumulating a line
//! - `Discarding`: an overlong line was reported, dropping bytes until the
//!   next terminator
//!
//! # Example
//!
//! ```
//! use chatwire::framing::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//!
//! assert!(buffer.push(b"PING :tmi.tw").is_empty());
//! let lines = buffer.push(b"itch.tv\r\n");
//! assert_eq!(lines, vec![Ok("PING :tmi.twitch.tv".to_string())]);
//! ```

use bytes::BytesMut;

use crate::config::DEFAULT_MAX_LINE_LENGTH;
use crate::error::FormatError;

const TERMINATOR: &[u8] = b"\r\n";

/// State machine for line extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating the current line.
    Line,
    /// Dropping the remainder of an overlong line.
    Discarding,
}

/// Buffer for accumulating incoming bytes and extracting complete lines.
///
/// Lines are emitted in arrival order without their terminator. Blank lines
/// are skipped. Each line is decoded as UTF-8 once complete, so a
/// multi-byte character split across reads is reassembled.
pub struct LineBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Longest accepted line, excluding the terminator.
    max_line_length: usize,
    /// Leading bytes already searched without finding a terminator.
    scanned: usize,
}

impl LineBuffer {
    /// Create a line buffer with the default 64 KiB line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a line buffer with a custom line limit.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            state: State::Line,
            max_line_length,
            scanned: 0,
        }
    }

    /// Push data into the buffer and extract all complete lines.
    ///
    /// Each entry is either a line or a [`FormatError::LineTooLong`] for a
    /// line that exceeded the limit. An error never affects the lines
    /// around it.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<String, FormatError>> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(line) = self.try_extract_one() {
            lines.push(line);
        }
        lines
    }

    fn try_extract_one(&mut self) -> Option<Result<String, FormatError>> {
        loop {
            let Some(end) = find_terminator(&self.buffer, self.scanned) else {
                // Keep the last byte: it may be the CR of a split terminator.
                self.scanned = self.buffer.len().saturating_sub(1);
                return self.check_overflow();
            };

            self.scanned = 0;
            let line = self.buffer.split_to(end + TERMINATOR.len());
            let line = &line[..end];

            if self.state == State::Discarding {
                self.state = State::Line;
                continue;
            }
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_line_length {
                return Some(Err(FormatError::LineTooLong {
                    max: self.max_line_length,
                }));
            }
            return Some(Ok(String::from_utf8_lossy(line).into_owned()));
        }
    }

    /// Handle a buffer with no terminator in it.
    fn check_overflow(&mut self) -> Option<Result<String, FormatError>> {
        // A trailing CR may be the first half of a split terminator.
        let pending_cr = self.buffer.last() == Some(&b'\r');

        match self.state {
            State::Line => {
                let content = self.buffer.len() - usize::from(pending_cr);
                if content <= self.max_line_length {
                    return None;
                }
                self.buffer.clear();
                self.scanned = 0;
                if pending_cr {
                    self.buffer.extend_from_slice(b"\r");
                }
                self.state = State::Discarding;
                Some(Err(FormatError::LineTooLong {
                    max: self.max_line_length,
                }))
            }
            State::Discarding => {
                self.buffer.clear();
                self.scanned = 0;
                if pending_cr {
                    self.buffer.extend_from_slice(b"\r");
                }
                None
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any unterminated data and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.state = State::Line;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of the first CR LF at or after `from`.
fn find_terminator(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_lines(results: Vec<Result<String, FormatError>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_split_across_chunks() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push(b"AB").is_empty());
        let lines = ok_lines(buffer.push(b"C\r\nDEF\r\n"));

        assert_eq!(lines, vec!["ABC", "DEF"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_byte_chunk_yields_nothing() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"").is_empty());

        buffer.push(b"partial");
        assert!(buffer.push(b"").is_empty());
        assert_eq!(buffer.len(), 7);
    }

    #[test]
    fn test_terminator_split_between_chunks() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push(b"PING :x\r").is_empty());
        let lines = ok_lines(buffer.push(b"\nPING :y\r\n"));

        assert_eq!(lines, vec!["PING :x", "PING :y"]);
    }

    #[test]
    fn test_many_lines_in_one_push() {
        let mut buffer = LineBuffer::new();
        let data = b"one\r\ntwo\r\nthree\r\nfour";

        let lines = ok_lines(buffer.push(data));

        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut buffer = LineBuffer::new();
        let lines = ok_lines(buffer.push(b"\r\n\r\nA\r\n\r\n"));
        assert_eq!(lines, vec!["A"]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = LineBuffer::new();
        let data = "PRIVMSG #c :héllo wörld\r\n".as_bytes();

        let mut all = Vec::new();
        for byte in data {
            all.extend(buffer.push(&[*byte]));
        }

        assert_eq!(ok_lines(all), vec!["PRIVMSG #c :héllo wörld"]);
    }

    #[test]
    fn test_overlong_line_reported_once_and_recovered() {
        let mut buffer = LineBuffer::with_max_line_length(8);

        let results = buffer.push(b"0123456789");
        assert_eq!(results, vec![Err(FormatError::LineTooLong { max: 8 })]);
        assert!(buffer.is_empty());

        // Rest of the overlong line is dropped silently.
        assert!(buffer.push(b"abcdef").is_empty());

        let lines = ok_lines(buffer.push(b"tail\r\nNEXT\r\n"));
        assert_eq!(lines, vec!["NEXT"]);
    }

    #[test]
    fn test_overlong_complete_line_does_not_affect_neighbours() {
        let mut buffer = LineBuffer::with_max_line_length(4);

        let results = buffer.push(b"ok\r\ntoolong\r\nok2\r\n");

        assert_eq!(
            results,
            vec![
                Ok("ok".to_string()),
                Err(FormatError::LineTooLong { max: 4 }),
                Ok("ok2".to_string()),
            ]
        );
    }

    #[test]
    fn test_long_line_in_small_chunks_resumes_scan() {
        let mut buffer = LineBuffer::new();
        let body = "a".repeat(60 * 1024);

        for chunk in body.as_bytes().chunks(7) {
            assert!(buffer.push(chunk).is_empty());
        }
        // Only the final byte is left to re-examine.
        assert_eq!(buffer.scanned, body.len() - 1);

        assert!(buffer.push(b"\r").is_empty());
        let lines = ok_lines(buffer.push(b"\nnext\r\n"));
        assert_eq!(lines, vec![body, "next".to_string()]);
        assert_eq!(buffer.scanned, 0);
    }

    #[test]
    fn test_clear_discards_partial_line() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"unterminated");
        buffer.clear();

        assert!(buffer.is_empty());
        let lines = ok_lines(buffer.push(b"fresh\r\n"));
        assert_eq!(lines, vec!["fresh"]);
    }
}
