//! Structural types: arrays and containers.
//!
//! Each node compiles its children once through the [`Compiler`] and builds
//! all three intents (read, write, size_of) from the shared child operations.
//! Containers are inlined first (see [`crate::inline`]).

use crate::compiled::{CompiledType, Decoded, Decoder, Encoder, Sizer};
use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::inline::inline_fields;
use crate::schema::{ArrayType, Field, Length};
use crate::value::{Record, Value, NULL};

/// Converts a decoded length prefix to an element count.
pub(crate) fn length_from(value: &Value) -> Result<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::decode(format!("invalid length prefix: {value}")))
}

/// Converts a schema-declared count to `usize`.
pub(crate) fn fixed_count(count: u64) -> Result<usize> {
    usize::try_from(count)
        .map_err(|_| Error::schema(format!("fixed count {count} does not fit in usize")))
}

/// Adds the field name to decode/encode error messages.
fn in_field(err: Error, name: &str) -> Error {
    match err {
        Error::Decode { message } => Error::decode(format!("{name}: {message}")),
        Error::Encode { message } => Error::encode(format!("{name}: {message}")),
        other => other,
    }
}

fn expect_items<'v>(value: &'v Value, expected: Option<usize>) -> Result<&'v [Value]> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::encode(format!("expected an array, got {}", value.kind())))?;
    match expected {
        Some(n) if n != items.len() => Err(Error::encode(format!(
            "array declares {n} elements, got {}",
            items.len()
        ))),
        _ => Ok(items),
    }
}

fn expect_record(value: &Value) -> Result<&Record> {
    value
        .as_record()
        .ok_or_else(|| Error::encode(format!("expected a record, got {}", value.kind())))
}

//--- Array ---

enum Count<T> {
    Fixed(usize),
    Prefixed(T),
}

impl Count<CompiledType> {
    fn intent<T>(&self, op: impl Fn(&CompiledType) -> T) -> Count<T> {
        match self {
            Count::Fixed(n) => Count::Fixed(*n),
            Count::Prefixed(prefix) => Count::Prefixed(op(prefix)),
        }
    }
}

/// Compiles an array node. The element and the length prefix are compiled
/// once and shared by all three intents.
pub fn compile_array(compiler: &mut Compiler<'_>, array: &ArrayType) -> Result<CompiledType> {
    let count = match array.length()? {
        Length::Fixed(n) => Count::Fixed(fixed_count(n)?),
        Length::Prefixed(ty) => Count::Prefixed(compiler.compile(ty)?),
    };
    let element = compiler.compile(&array.element)?;
    Ok(CompiledType {
        read: read_array(count.intent(|c| c.read.clone()), element.read),
        write: write_array(count.intent(|c| c.write.clone()), element.write),
        size_of: size_of_array(count.intent(|c| c.size_of.clone()), element.size_of),
    })
}

fn read_array(count: Count<Decoder>, element: Decoder) -> Decoder {
    Decoder::new(move |buf, offset, scope| {
        let (count, count_size, prefixed) = match &count {
            Count::Fixed(n) => (*n, 0, false),
            Count::Prefixed(read_count) => {
                let Decoded { value, size } = read_count.decode(buf, offset, scope)?;
                (length_from(&value)?, size, true)
            }
        };
        let remaining = buf.len().saturating_sub(offset + count_size);
        // cap the preallocation by what the buffer could possibly hold
        let mut items = Vec::with_capacity(count.min(remaining));
        let mut size = count_size;
        for _ in 0..count {
            let elem = element.decode(buf, offset + size, scope)?;
            // a prefix may not claim more zero-width elements than bytes remain
            if prefixed && elem.size == 0 && count > remaining {
                return Err(Error::decode(format!(
                    "array of {count} zero-width elements exceeds the {remaining} bytes available"
                )));
            }
            items.push(elem.value);
            size += elem.size;
        }
        Ok(Decoded::new(Value::Array(items), size))
    })
}

fn write_array(count: Count<Encoder>, element: Encoder) -> Encoder {
    Encoder::new(move |value, dest, mut offset, scope| {
        let items = match &count {
            Count::Fixed(n) => expect_items(value, Some(*n))?,
            Count::Prefixed(write_count) => {
                let items = expect_items(value, None)?;
                offset = write_count.encode(&Value::from(items.len()), dest, offset, scope)?;
                items
            }
        };
        for item in items {
            offset = element.encode(item, dest, offset, scope)?;
        }
        Ok(offset)
    })
}

fn size_of_array(count: Count<Sizer>, element: Sizer) -> Sizer {
    let element_size = element.fixed_size();
    Sizer::new(move |value, scope| {
        let (items, mut size) = match &count {
            Count::Fixed(n) => (expect_items(value, Some(*n))?, 0),
            Count::Prefixed(size_count) => {
                let items = expect_items(value, None)?;
                (items, size_count.size_of(&Value::from(items.len()), scope)?)
            }
        };
        match element_size {
            Some(each) => {
                for item in items {
                    element.check(item, scope)?;
                }
                size += items.len() * each;
            }
            None => {
                for item in items {
                    size += element.size_of(item, scope)?;
                }
            }
        }
        Ok(size)
    })
}

//--- Container ---

/// Compiles a container node: inlines its fields, then compiles each field
/// type once for all three intents.
pub fn compile_container(compiler: &mut Compiler<'_>, fields: &[Field]) -> Result<CompiledType> {
    let fields = inline_fields(fields)?
        .into_iter()
        .map(|f| Ok((f.name, compiler.compile(&f.ty)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(CompiledType {
        read: read_container(intent(&fields, |c| c.read.clone())),
        write: write_container(intent(&fields, |c| c.write.clone())),
        size_of: size_of_container(intent(&fields, |c| c.size_of.clone())),
    })
}

fn intent<T>(fields: &[(String, CompiledType)], op: impl Fn(&CompiledType) -> T) -> Vec<(String, T)> {
    fields.iter().map(|(name, ty)| (name.clone(), op(ty))).collect()
}

fn read_container(fields: Vec<(String, Decoder)>) -> Decoder {
    Decoder::new(move |buf, offset, scope| {
        let mut record = Record::with_capacity(fields.len());
        let mut size = 0;
        for (name, read) in &fields {
            let decoded = {
                let frame = scope.child(&record);
                read.decode(buf, offset + size, &frame)
                    .map_err(|e| in_field(e, name))?
            };
            size += decoded.size;
            record.push(name.clone(), decoded.value);
        }
        Ok(Decoded::new(Value::Record(record), size))
    })
}

fn write_container(fields: Vec<(String, Encoder)>) -> Encoder {
    Encoder::new(move |value, dest, mut offset, scope| {
        let record = expect_record(value)?;
        let frame = scope.child(record);
        for (name, write) in &fields {
            let field_value = record.get(name).unwrap_or(&NULL);
            offset = write
                .encode(field_value, dest, offset, &frame)
                .map_err(|e| in_field(e, name))?;
        }
        Ok(offset)
    })
}

fn size_of_container(fields: Vec<(String, Sizer)>) -> Sizer {
    Sizer::new(move |value, scope| {
        let record = expect_record(value)?;
        let frame = scope.child(record);
        let mut size = 0;
        for (name, size_of) in &fields {
            let field_value = record.get(name).unwrap_or(&NULL);
            size += size_of
                .size_of(field_value, &frame)
                .map_err(|e| in_field(e, name))?;
        }
        Ok(size)
    })
}
