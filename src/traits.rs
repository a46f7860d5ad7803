//! Core traits for the packet framer.

use crate::error::Result;
use crate::packet::Packet;

/// A strategy for turning byte chunks into decoded packets.
///
/// Purpose: let the io adapters drive either the incremental [`Parser`]
/// (chunks of arbitrary size) or the [`FullPacketParser`] (one packet per
/// chunk) through the same interface.
///
/// [`Parser`]: crate::framing::Parser
/// [`FullPacketParser`]: crate::framing::FullPacketParser
pub trait ChunkParser {
    /// Consumes one chunk, calling `emit` for every packet it completes, in
    /// stream order.
    ///
    /// If `emit` returns an error, processing stops and that error is
    /// returned. Packets already emitted stay emitted.
    fn transform<F>(&mut self, chunk: &[u8], emit: F) -> Result<()>
    where
        F: FnMut(Packet) -> Result<()>;

    /// Bytes held back while waiting for the rest of a packet.
    fn buffered(&self) -> usize {
        0
    }
}
