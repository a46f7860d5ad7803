//! # protoframe
//!
//! Declarative binary protocol codecs with incremental packet framing.
//!
//! ## Overview
//!
//! `protoframe` compiles structural type descriptions (primitives, arrays,
//! containers, switches) into decode, encode, and measure operations, then
//! drives those operations over byte streams. The library separates concerns
//! the same way on both sides:
//!
//! * **Schema**: [`TypeNode`] trees, registered by name in a [`Protocol`]
//! * **Compiler**: a [`Compiler`] session turns nodes into [`CompiledType`]s
//! * **Framing**: [`Serializer`], [`Parser`], and [`FullPacketParser`] turn
//!   values into chunks and chunks into [`Packet`]s
//!
//! ## Key Features
//!
//! * **Container Inlining**: anonymous container fields splice into their
//!   parent; anonymous switches of containers are transposed into one switch
//!   per field
//! * **Context-Dependent Switches**: discriminants resolve through enclosing
//!   records with `/` and `..` paths
//! * **Incremental Parsing**: packets split across any number of chunks are
//!   reassembled; corrupt input is discarded and reported, never fatal
//!
//! ## Quick Start
//!
//! ```rust
//! use protoframe::*;
//! use std::io::Cursor;
//!
//! fn main() -> Result<()> {
//!     let protocol = Protocol::new().with_type(
//!         "packet",
//!         TypeNode::container([
//!             Field::new("id", Primitive::U8),
//!             Field::new("name", TypeNode::pstring(Primitive::VarInt.into())),
//!         ]),
//!     );
//!     let compiled = protocol.compile("packet")?;
//!
//!     let mut writer = PacketWriter::new(Vec::new(), Serializer::new(compiled.clone()));
//!     writer.write(&Record::new().with("id", 1u8).with("name", "hello").into())?;
//!     let bytes = writer.into_inner();
//!
//!     let mut reader = PacketReader::new(Cursor::new(bytes), Parser::new(compiled));
//!     reader.process_all(|packet| {
//!         println!("{} ({} bytes)", packet.data, packet.metadata.size);
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod compiled;
pub mod compiler;
pub mod conditional;
pub mod error;
pub mod framing;
pub mod inline;
pub mod native;
pub mod packet;
pub mod reader;
pub mod schema;
pub mod structures;
pub mod traits;
pub mod value;
pub mod writer;

// Re-export the main public API for user convenience.
pub use compiled::{CompiledType, Decoded, Decoder, Encoder, Scope, Sizer};
pub use compiler::{Compiler, Protocol};
pub use error::{Error, Result};
pub use framing::{
    ChunkParserExt, FullPacketParser, ObserverParser, Parser, ParserConfig, Serializer,
};
pub use inline::inline_fields;
pub use packet::{Packet, PacketMetadata};
pub use reader::{PacketReader, Packets};
pub use schema::{
    ArrayType, BufferType, Discriminant, Field, Length, Primitive, SwitchType, TypeNode,
};
pub use traits::ChunkParser;
pub use value::{Record, Value};
pub use writer::PacketWriter;
