//! A generic, composable packet reader over `std::io::Read`.

use crate::error::{Error, Result};
use crate::framing::Parser;
use crate::packet::Packet;
use crate::traits::ChunkParser;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

/// Bytes requested from the source per read call.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// A reader for streaming packets out of a byte source.
///
/// This reader is generic over a [`ChunkParser`] strategy, which defines how
/// the bytes of each read call become packets. It provides two APIs:
///
/// 1. **Processor API** (`process_all()`): closure-based processing
/// 2. **Expert API** (`packets()`): manual iteration for control flow
///
/// The source is only read when every packet decoded from earlier chunks has
/// been handed out, so a slow consumer holds back the source.
///
/// With [`FullPacketParser`](crate::FullPacketParser) each successful read
/// call is one packet; use it only over message-oriented sources.
///
/// ```rust
/// # use protoframe::{PacketReader, Parser, Protocol, Result};
/// # use std::io::Cursor;
/// let compiled = Protocol::new().compile("u16")?;
/// let mut reader = PacketReader::new(Cursor::new(vec![0, 1, 0, 2]), Parser::new(compiled));
///
/// reader.process_all(|packet| {
///     println!("{} ({} bytes)", packet.data, packet.metadata.size);
///     Ok(())
/// })?;
/// # Ok::<(), protoframe::Error>(())
/// ```
pub struct PacketReader<R: Read, P: ChunkParser = Parser> {
    reader: R,
    parser: P,
    chunk: Vec<u8>,
    pending: VecDeque<Packet>,
    // parser error held back until the packets decoded before it are handed out
    pending_error: Option<Error>,
}

impl<R: Read, P: ChunkParser> PacketReader<R, P> {
    pub fn new(reader: R, parser: P) -> Self {
        Self::with_chunk_size(reader, parser, DEFAULT_CHUNK_SIZE)
    }

    /// Creates a reader that requests `chunk_size` bytes per read call.
    pub fn with_chunk_size(reader: R, parser: P, chunk_size: usize) -> Self {
        Self {
            reader,
            parser,
            chunk: vec![0; chunk_size.max(1)],
            pending: VecDeque::new(),
            pending_error: None,
        }
    }

    /// Reads the next packet.
    /// Returns Ok(Some(packet)) on success, Ok(None) on clean EOF.
    ///
    /// EOF in the middle of a packet is `Error::UnexpectedEof`. When a read
    /// holds good packets followed by a corrupt one, the good packets are
    /// returned first and the parser error after them.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Ok(Some(packet));
            }
            if let Some(err) = self.pending_error.take() {
                return Err(err);
            }
            let n = match self.reader.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return match self.parser.buffered() {
                    0 => Ok(None),
                    buffered => Err(Error::UnexpectedEof { buffered }),
                };
            }
            let pending = &mut self.pending;
            let step = self.parser.transform(&self.chunk[..n], |packet| {
                pending.push_back(packet);
                Ok(())
            });
            if let Err(err) = step {
                self.pending_error = Some(err);
            }
        }
    }

    /// Processes all packets in the stream using a closure.
    ///
    /// Stops at the first error, whether from the source, the parser, or the
    /// closure.
    pub fn process_all<F>(&mut self, mut processor: F) -> Result<()>
    where
        F: FnMut(Packet) -> Result<()>,
    {
        while let Some(packet) = self.read_packet()? {
            processor(packet)?;
        }
        Ok(())
    }

    /// Returns an iterator-like object for manual packet processing.
    pub fn packets(&mut self) -> Packets<'_, R, P> {
        Packets { reader: self }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Consumes the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read, P: ChunkParser> Iterator for PacketReader<R, P> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_packet().transpose()
    }
}

/// An iterator-like object for manual packet processing.
///
/// Borrows the `PacketReader` mutably for its lifetime.
pub struct Packets<'a, R: Read, P: ChunkParser> {
    reader: &'a mut PacketReader<R, P>,
}

impl<'a, R: Read, P: ChunkParser> Packets<'a, R, P> {
    /// Returns the next packet in the stream.
    ///
    /// # Returns
    /// * `Ok(Some(packet))` - A packet was successfully read
    /// * `Ok(None)` - End of stream reached
    /// * `Err(e)` - An error occurred during reading
    pub fn next(&mut self) -> Result<Option<Packet>> {
        self.reader.read_packet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::FullPacketParser;
    use crate::schema::{Field, Primitive, TypeNode};
    use crate::value::{Record, Value};
    use crate::Protocol;
    use std::io::Cursor;

    fn u16_parser() -> Parser {
        Parser::new(Protocol::new().compile("u16").unwrap())
    }

    /// `{ id: u8, text: pstring(u8) }`
    fn note_parser() -> Parser {
        let compiled = Protocol::new()
            .compiler()
            .compile(&TypeNode::container([
                Field::new("id", Primitive::U8),
                Field::new("text", TypeNode::pstring(Primitive::U8.into())),
            ]))
            .unwrap();
        Parser::new(compiled)
    }

    /// One good packet then a packet whose text is invalid utf-8, in a single read.
    fn good_then_corrupt() -> Vec<u8> {
        vec![1, 2, b'h', b'i', 2, 1, 0xc0]
    }

    fn note(id: u8, text: &str) -> Value {
        Record::new().with("id", id).with("text", text).into()
    }

    #[test]
    fn reads_packets_across_chunk_boundaries() {
        let bytes = vec![0, 1, 0, 2, 0, 3];
        let mut reader = PacketReader::with_chunk_size(Cursor::new(bytes), u16_parser(), 3);
        let values: Vec<Value> = reader
            .by_ref()
            .map(|p| p.unwrap().data)
            .collect();
        assert_eq!(values, vec![Value::from(1u16), 2u16.into(), 3u16.into()]);
    }

    #[test]
    fn clean_eof_returns_none() {
        let mut reader = PacketReader::new(Cursor::new(Vec::<u8>::new()), u16_parser());
        assert!(reader.read_packet().unwrap().is_none());
    }

    #[test]
    fn eof_mid_packet_is_an_error() {
        let mut reader = PacketReader::new(Cursor::new(vec![0, 1, 0]), u16_parser());
        assert!(reader.read_packet().unwrap().is_some());
        assert!(matches!(
            reader.read_packet(),
            Err(Error::UnexpectedEof { buffered: 1 })
        ));
    }

    #[test]
    fn expert_api_matches_processor_api() {
        let bytes = vec![0, 9, 0, 8];
        let mut first = Vec::new();
        PacketReader::new(Cursor::new(bytes.clone()), u16_parser())
            .process_all(|p| {
                first.push(p);
                Ok(())
            })
            .unwrap();

        let mut reader = PacketReader::new(Cursor::new(bytes), u16_parser());
        let mut packets = reader.packets();
        let mut second = Vec::new();
        while let Some(p) = packets.next().unwrap() {
            second.push(p);
        }
        assert_eq!(first, second);
    }

    #[test]
    fn processor_error_stops_iteration() {
        let mut reader = PacketReader::new(Cursor::new(vec![0, 1, 0, 2]), u16_parser());
        let mut seen = 0;
        let result = reader.process_all(|_| {
            seen += 1;
            Err(Error::decode("stop"))
        });
        assert!(result.is_err());
        assert_eq!(seen, 1);
    }

    #[test]
    fn packets_before_a_corrupt_one_come_first() {
        let mut reader = PacketReader::new(Cursor::new(good_then_corrupt()), note_parser());
        assert_eq!(reader.read_packet().unwrap().unwrap().data, note(1, "hi"));
        assert!(matches!(reader.read_packet(), Err(Error::Discarded { .. })));
        assert!(reader.read_packet().unwrap().is_none());
    }

    #[test]
    fn process_all_sees_packets_before_a_corrupt_one() {
        let mut reader = PacketReader::new(Cursor::new(good_then_corrupt()), note_parser());
        let mut seen = Vec::new();
        let result = reader.process_all(|p| {
            seen.push(p.data);
            Ok(())
        });
        assert!(matches!(result, Err(Error::Discarded { .. })));
        assert_eq!(seen, vec![note(1, "hi")]);
    }

    #[test]
    fn full_packet_parser_treats_each_read_as_a_packet() {
        let compiled = Protocol::new().compile("u8").unwrap();
        let mut reader = PacketReader::with_chunk_size(
            Cursor::new(vec![4, 5]),
            FullPacketParser::new(compiled),
            1,
        );
        assert_eq!(reader.read_packet().unwrap().unwrap().data, Value::from(4u8));
        assert_eq!(reader.read_packet().unwrap().unwrap().data, Value::from(5u8));
        assert!(reader.read_packet().unwrap().is_none());
    }
}
