//! Reassembly of fragmented socket frames into logical text messages.

use crate::error::{ClientError, Result};

/// Accumulates continuation fragments until a final fragment completes one
/// logical text message.
///
/// One assembler serves one socket, driven only by that socket's receive
/// loop; fragments from two logical messages never interleave because the
/// loop is the single reader.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw fragment.
    ///
    /// Returns `Ok(Some(text))` when `is_final` completes a logical
    /// message, `Ok(None)` while more fragments are expected. A completed
    /// message that is not valid UTF-8 fails with
    /// [`ClientError::MalformedMessage`].
    pub fn push(&mut self, fragment: &[u8], is_final: bool) -> Result<Option<String>> {
        self.buffer.extend_from_slice(fragment);
        if !is_final {
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.buffer);
        let text = String::from_utf8(bytes)
            .map_err(|e| ClientError::MalformedMessage(format!("invalid UTF-8: {e}")))?;
        Ok(Some(text))
    }

    /// Whether a partial message is currently buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Notify the assembler that the peer closed the socket.
    ///
    /// Fails with [`ClientError::TransportClosed`] if the close arrived
    /// before the final fragment of a message in progress.
    pub fn close(&mut self) -> Result<()> {
        if self.has_partial() {
            self.buffer.clear();
            return Err(ClientError::TransportClosed);
        }
        Ok(())
    }
}
