//! Type registry and compiler engine.
//!
//! A [`Protocol`] holds named type definitions. A [`Compiler`] session turns
//! type nodes into [`CompiledType`]s, resolving references against the
//! protocol (then against the primitive names) and memoizing every named type
//! it compiles so repeated references share the same operations.

use crate::compiled::{CompiledType, Decoder, Encoder, Sizer};
use crate::conditional;
use crate::error::{Error, Result};
use crate::native;
use crate::packet::Packet;
use crate::schema::{Primitive, TypeNode};
use crate::structures;
use crate::value::Value;
use std::collections::HashMap;

/// A set of named type definitions.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
    types: HashMap<String, TypeNode>,
}

impl Protocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a named type. Names shadow primitives.
    pub fn add_type(&mut self, name: impl Into<String>, node: TypeNode) -> &mut Self {
        self.types.insert(name.into(), node);
        self
    }

    /// Builder-style [`add_type`](Self::add_type).
    pub fn with_type(mut self, name: impl Into<String>, node: TypeNode) -> Self {
        self.add_type(name, node);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeNode> {
        self.types.get(name)
    }

    /// Starts a compile session over this protocol.
    pub fn compiler(&self) -> Compiler<'_> {
        Compiler::new(self)
    }

    /// Compiles the named type.
    pub fn compile(&self, name: &str) -> Result<CompiledType> {
        self.compiler().compile_named(name)
    }

    /// Decodes one packet of type `name` from the start of `buffer`.
    pub fn parse_packet_buffer(&self, name: &str, buffer: &[u8]) -> Result<Packet> {
        Packet::decode(&self.compile(name)?, buffer)
    }

    /// Encodes `value` as type `name` into a new buffer.
    pub fn create_packet_buffer(&self, name: &str, value: &Value) -> Result<Vec<u8>> {
        self.compile(name)?.encode(value)
    }
}

/// A compile session. Named types compiled in a session are cached in it.
pub struct Compiler<'p> {
    protocol: &'p Protocol,
    cache: HashMap<String, CompiledType>,
    resolving: Vec<String>,
}

impl<'p> Compiler<'p> {
    pub fn new(protocol: &'p Protocol) -> Self {
        Self {
            protocol,
            cache: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    /// Compiles all three intents of `node`. Child nodes are compiled once
    /// and shared by the three intents.
    pub fn compile(&mut self, node: &TypeNode) -> Result<CompiledType> {
        match node {
            TypeNode::Ref(name) => self.compile_named(name),
            TypeNode::Primitive(p) => Ok(native::compile_primitive(*p)),
            TypeNode::PString { count_type } => conditional::compile_pstring(self, count_type),
            TypeNode::Buffer(buffer) => conditional::compile_buffer(self, buffer),
            TypeNode::Option(inner) => conditional::compile_option(self, inner),
            TypeNode::Switch(switch) => conditional::compile_switch(self, switch),
            TypeNode::Array(array) => structures::compile_array(self, array),
            TypeNode::Container(fields) => structures::compile_container(self, fields),
        }
    }

    /// Compiles the decode intent of `node`.
    pub fn compile_read(&mut self, node: &TypeNode) -> Result<Decoder> {
        Ok(self.compile(node)?.read)
    }

    /// Compiles the encode intent of `node`.
    pub fn compile_write(&mut self, node: &TypeNode) -> Result<Encoder> {
        Ok(self.compile(node)?.write)
    }

    /// Compiles the measure intent of `node`.
    pub fn compile_size_of(&mut self, node: &TypeNode) -> Result<Sizer> {
        Ok(self.compile(node)?.size_of)
    }

    /// Resolves and compiles a named type, using the session cache.
    pub fn compile_named(&mut self, name: &str) -> Result<CompiledType> {
        if let Some(compiled) = self.cache.get(name) {
            return Ok(compiled.clone());
        }
        if self.resolving.iter().any(|n| n == name) {
            return Err(Error::schema(format!(
                "recursive type reference: {} -> {name}",
                self.resolving.join(" -> ")
            )));
        }

        let compiled = match self.protocol.get(name) {
            Some(node) => {
                tracing::debug!(type_name = name, "compiling type");
                self.resolving.push(name.to_owned());
                let result = self.compile(node);
                self.resolving.pop();
                result.map_err(|e| match e {
                    Error::Schema { message } => Error::schema(format!("in {name}: {message}")),
                    other => other,
                })?
            }
            None => match Primitive::from_name(name) {
                Some(p) => native::compile_primitive(p),
                None => return Err(Error::schema(format!("unknown type: {name}"))),
            },
        };
        self.cache.insert(name.to_owned(), compiled.clone());
        Ok(compiled)
    }
}
