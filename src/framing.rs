//! Packet stream framing: serializer, incremental parser, and full-packet parser.
//!
//! Each type is a one-directional step transform bound to a compiled
//! top-level type. A step either completes (possibly producing output) or
//! fails before the next step starts. Instances hold no shared mutable
//! state; the compiled type they drive can be shared freely.

use crate::compiled::{CompiledType, Scope};
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::traits::ChunkParser;
use crate::value::Value;
use bytes::{Buf, BytesMut};

//--- Serializer ---

/// Encodes one value per step into exactly one byte chunk.
///
/// Failure semantics: returns `Error::Unserializable` carrying the rejected
/// value; no bytes are produced for that step.
#[derive(Debug, Clone)]
pub struct Serializer {
    compiled: CompiledType,
}

impl Serializer {
    pub fn new(compiled: CompiledType) -> Self {
        Self { compiled }
    }

    /// Encodes `value` into a new chunk.
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize_into(value, &mut out)?;
        Ok(out)
    }

    /// Appends the encoding of `value` to `out`, returning the bytes added.
    /// On failure `out` is left as it was.
    pub fn serialize_into(&self, value: &Value, out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        let written = self.encode_at(value, out, start);
        if written.is_err() {
            out.truncate(start);
        }
        written.map_err(|source| Error::Unserializable {
            packet: Box::new(value.clone()),
            source: Box::new(source),
        })
    }

    fn encode_at(&self, value: &Value, out: &mut Vec<u8>, start: usize) -> Result<usize> {
        let size = self.compiled.measure(value)?;
        out.resize(start + size, 0);
        let end = self
            .compiled
            .write
            .encode(value, out, start, &Scope::root())?;
        if end != start + size {
            return Err(Error::encode(format!(
                "encoded {} bytes but measured {size}",
                end - start
            )));
        }
        Ok(size)
    }
}

//--- Parser ---

/// Settings for the incremental [`Parser`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserConfig {
    /// Most bytes a partial packet may occupy before the parser gives up on
    /// it. `None` is unbounded.
    pub max_buffered: Option<usize>,
}

impl ParserConfig {
    pub fn bounded(max_buffered: usize) -> Self {
        Self {
            max_buffered: Some(max_buffered),
        }
    }
}

/// Incremental parser: chunks of any size in, whole packets out.
///
/// Bytes accumulate until the top-level type decodes. A partial read means
/// "wait for more"; any other decode error discards the whole accumulator
/// and fails the step with `Error::Discarded`, so the next chunk is parsed
/// from an empty buffer.
///
/// Two APIs are offered:
///
/// 1. **Step API** ([`ChunkParser::transform`]): feed a chunk, receive every
///    packet it completes.
/// 2. **Pull API** ([`feed`](Self::feed) + [`next_packet`](Self::next_packet)):
///    decode one packet at a time, so a slow consumer holds back the source.
#[derive(Debug)]
pub struct Parser {
    compiled: CompiledType,
    buffer: BytesMut,
    config: ParserConfig,
}

impl Parser {
    pub fn new(compiled: CompiledType) -> Self {
        Self::with_config(compiled, ParserConfig::default())
    }

    pub fn with_config(compiled: CompiledType, config: ParserConfig) -> Self {
        Self {
            compiled,
            buffer: BytesMut::new(),
            config,
        }
    }

    /// Appends a chunk to the accumulator without decoding.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decodes one packet from the front of the accumulator.
    ///
    /// Returns Ok(None) when more bytes are needed.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        match Packet::decode(&self.compiled, &self.buffer[..]) {
            Ok(packet) if packet.metadata.size == 0 => {
                Err(self.discard(Error::decode("packet consumed no bytes")))
            }
            Ok(packet) => {
                self.buffer.advance(packet.metadata.size);
                tracing::trace!(
                    size = packet.metadata.size,
                    buffered = self.buffer.len(),
                    "packet decoded"
                );
                Ok(Some(packet))
            }
            Err(e) if e.is_partial_read() => match self.config.max_buffered {
                Some(limit) if self.buffer.len() > limit => {
                    let buffered = self.buffer.len();
                    Err(self.discard(Error::BufferOverflow { buffered, limit }))
                }
                _ => Ok(None),
            },
            Err(e) => Err(self.discard(e)),
        }
    }

    /// Drops the accumulator, wrapping `source` with the discarded bytes.
    fn discard(&mut self, source: Error) -> Error {
        let buffer = std::mem::take(&mut self.buffer).to_vec();
        tracing::debug!(
            discarded = buffer.len(),
            error = %source,
            "decode failed, dropping buffered bytes"
        );
        Error::Discarded {
            buffer,
            source: Box::new(source),
        }
    }

    /// The bytes currently buffered.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drops buffered bytes without decoding them.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl ChunkParser for Parser {
    fn transform<F>(&mut self, chunk: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(Packet) -> Result<()>,
    {
        self.feed(chunk);
        while let Some(packet) = self.next_packet()? {
            emit(packet)?;
        }
        Ok(())
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

//--- FullPacketParser ---

/// Decodes exactly one packet from each chunk, carrying nothing between steps.
///
/// A packet that does not span the whole chunk is still emitted; the
/// mismatch is only logged.
#[derive(Debug, Clone)]
pub struct FullPacketParser {
    compiled: CompiledType,
}

impl FullPacketParser {
    pub fn new(compiled: CompiledType) -> Self {
        Self { compiled }
    }

    pub fn parse(&self, chunk: &[u8]) -> Result<Packet> {
        let packet = Packet::decode(&self.compiled, chunk)?;
        if packet.metadata.size != chunk.len() {
            tracing::warn!(
                chunk_size = chunk.len(),
                read = packet.metadata.size,
                data = %packet.data,
                buffer = %hex::encode(chunk),
                "chunk size does not match packet size; partial packet"
            );
        }
        Ok(packet)
    }
}

impl ChunkParser for FullPacketParser {
    fn transform<F>(&mut self, chunk: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(Packet) -> Result<()>,
    {
        emit(self.parse(chunk)?)
    }
}

//--- Observer Adapter ---

/// An adapter that observes emitted packets without altering them.
///
/// Callback timing: invoked once per packet, before it is passed on.
pub struct ObserverParser<P: ChunkParser, C: Fn(&Packet)> {
    inner: P,
    callback: C,
}

impl<P: ChunkParser, C: Fn(&Packet)> ObserverParser<P, C> {
    pub fn new(inner: P, callback: C) -> Self {
        Self { inner, callback }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: ChunkParser, C: Fn(&Packet)> ChunkParser for ObserverParser<P, C> {
    fn transform<F>(&mut self, chunk: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(Packet) -> Result<()>,
    {
        let callback = &self.callback;
        self.inner.transform(chunk, |packet| {
            callback(&packet);
            emit(packet)
        })
    }

    fn buffered(&self) -> usize {
        self.inner.buffered()
    }
}

/// Extension methods for chunk parsers to enable fluent composition.
pub trait ChunkParserExt: ChunkParser + Sized {
    /// Observe packets as they are emitted. Useful for metrics/logging.
    fn observed<C: Fn(&Packet)>(self, callback: C) -> ObserverParser<Self, C> {
        ObserverParser::new(self, callback)
    }
}

impl<T: ChunkParser> ChunkParserExt for T {}
