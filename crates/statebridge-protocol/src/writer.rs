//! Line-framed message output.

use std::io::Write;

use crate::error::ProtocolError;
use crate::message::Message;

/// Writes messages as JSON lines.
///
/// Each message is serialised, terminated with a newline and flushed so the
/// peer sees it without waiting for further output.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: Write> MessageWriter<W> {
    /// Wraps an output stream.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one message.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        serde_json::to_writer(&mut self.writer, message).map_err(ProtocolError::Serialize)?;
        self.write_terminator()
    }

    /// Writes text that is already an encoded message.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_encoded(&mut self, encoded: &str) -> Result<(), ProtocolError> {
        self.writer.write_all(encoded.trim_end().as_bytes())?;
        self.write_terminator()
    }

    fn write_terminator(&mut self) -> Result<(), ProtocolError> {
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the wrapped stream.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}
