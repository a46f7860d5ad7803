//! A packet writer over `std::io::Write`.

use crate::error::Result;
use crate::framing::Serializer;
use crate::value::Value;
use std::io::Write;

/// A writer for streaming packets into a byte sink.
///
/// Each value is encoded into a reused scratch buffer and written with a
/// single `write_all`, so a value that fails to encode writes nothing.
pub struct PacketWriter<W: Write> {
    writer: W,
    serializer: Serializer,
    scratch: Vec<u8>,
}

impl<W: Write> PacketWriter<W> {
    pub fn new(writer: W, serializer: Serializer) -> Self {
        Self {
            writer,
            serializer,
            scratch: Vec::new(),
        }
    }

    /// Encodes `value` and writes it to the sink.
    pub fn write(&mut self, value: &Value) -> Result<()> {
        self.scratch.clear();
        self.serializer.serialize_into(value, &mut self.scratch)?;
        self.writer.write_all(&self.scratch)?;
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Consumes the writer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
