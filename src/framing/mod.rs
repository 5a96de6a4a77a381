//! Stream framing.
//!
//! Turns arbitrarily chunked transport input into whole protocol units:
//! CR LF terminated lines for chat, complete messages for the WebSocket
//! protocols. Units are emitted in arrival order and never coalesced.

mod line_buffer;
mod message_buffer;

pub use line_buffer::LineBuffer;
pub use message_buffer::MessageBuffer;
