//! Decoded packets and their metadata.

use crate::compiled::CompiledType;
use crate::error::Result;
use crate::value::Value;

/// Bookkeeping attached to every decoded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketMetadata {
    /// Bytes consumed from the input.
    pub size: usize,
}

/// One decoded value of the framer's top-level type.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub data: Value,
    pub metadata: PacketMetadata,
}

impl Packet {
    /// Decodes one packet from the start of `buffer`.
    pub fn decode(compiled: &CompiledType, buffer: &[u8]) -> Result<Self> {
        let decoded = compiled.decode(buffer)?;
        Ok(Self {
            data: decoded.value,
            metadata: PacketMetadata { size: decoded.size },
        })
    }
}
