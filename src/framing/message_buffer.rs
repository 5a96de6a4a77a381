//! Message reassembly for the WebSocket protocols.
//!
//! A WebSocket message may arrive as several fragments. The buffer
//! accumulates them until the final fragment, then decodes the whole
//! message as UTF-8 text.

use bytes::BytesMut;

use crate::error::FormatError;

/// Buffer for assembling fragmented WebSocket messages.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    buffer: BytesMut,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one fragment.
    ///
    /// Returns the assembled message once `end_of_message` is set. A
    /// zero-byte fragment is never a boundary on its own: with nothing
    /// buffered it yields `None` even when marked final.
    pub fn push(
        &mut self,
        data: &[u8],
        end_of_message: bool,
    ) -> Option<Result<String, FormatError>> {
        self.buffer.extend_from_slice(data);

        if !end_of_message || self.buffer.is_empty() {
            return None;
        }

        let assembled = self.buffer.split().freeze();
        Some(
            std::str::from_utf8(&assembled)
                .map(str::to_string)
                .map_err(|_| FormatError::InvalidUtf8),
        )
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop a partially received message.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
