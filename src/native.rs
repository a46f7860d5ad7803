//! Primitive codecs: fixed-width numbers, booleans, varints, and void.
//!
//! Reads report [`Error::PartialRead`] when the buffer ends early so the
//! incremental parser can wait for more input.

use crate::compiled::{CompiledType, Decoded, Decoder, Encoder, Sizer};
use crate::error::{Error, Result};
use crate::schema::Primitive;
use crate::value::Value;

/// Borrows `N` bytes at `offset`, or reports how many bytes are missing.
#[inline]
pub(crate) fn take<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset.saturating_add(N);
    match buffer.get(offset..end) {
        Some(bytes) => {
            let mut out = [0u8; N];
            out.copy_from_slice(bytes);
            Ok(out)
        }
        None => Err(Error::partial_read(end, buffer.len())),
    }
}

/// Borrows `len` bytes at `offset`.
#[inline]
pub(crate) fn take_slice(buffer: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| Error::decode(format!("length {len} overflows the buffer offset")))?;
    buffer
        .get(offset..end)
        .ok_or_else(|| Error::partial_read(end, buffer.len()))
}

/// Copies `bytes` into `dest` at `offset`, returning the new offset.
#[inline]
pub(crate) fn put(dest: &mut [u8], offset: usize, bytes: &[u8]) -> Result<usize> {
    let end = offset.saturating_add(bytes.len());
    let dest_len = dest.len();
    let slot = dest.get_mut(offset..end).ok_or_else(|| {
        Error::encode(format!(
            "destination too small: need {end} bytes, have {dest_len}"
        ))
    })?;
    slot.copy_from_slice(bytes);
    Ok(end)
}

fn expect_u64(value: &Value, ty: &str) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        Error::encode(format!(
            "expected a non-negative integer for {ty}, got {} {value}",
            value.kind()
        ))
    })
}

fn expect_i64(value: &Value, ty: &str) -> Result<i64> {
    value.as_i64().ok_or_else(|| {
        Error::encode(format!(
            "expected an integer for {ty}, got {} {value}",
            value.kind()
        ))
    })
}

fn expect_f64(value: &Value, ty: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::encode(format!(
            "expected a number for {ty}, got {} {value}",
            value.kind()
        ))
    })
}

fn out_of_range(value: impl std::fmt::Display, ty: &str) -> Error {
    Error::encode(format!("value {value} out of range for {ty}"))
}

macro_rules! unsigned {
    ($name:literal, $t:ty, $from:ident, $to:ident) => {{
        let check = |value: &Value| -> Result<$t> {
            let v = expect_u64(value, $name)?;
            <$t>::try_from(v).map_err(|_| out_of_range(v, $name))
        };
        CompiledType {
            read: Decoder::new(|buf, offset, _| {
                let bytes = take(buf, offset)?;
                Ok(Decoded::new(
                    Value::UInt(<$t>::$from(bytes) as u64),
                    std::mem::size_of::<$t>(),
                ))
            }),
            write: Encoder::new(move |value, dest, offset, _| {
                put(dest, offset, &check(value)?.$to())
            }),
            size_of: Sizer::fixed_checked(std::mem::size_of::<$t>(), move |value, _| {
                check(value).map(drop)
            }),
        }}
    };
}

macro_rules! signed {
    ($name:literal, $t:ty, $from:ident, $to:ident) => {{
        let check = |value: &Value| -> Result<$t> {
            let v = expect_i64(value, $name)?;
            <$t>::try_from(v).map_err(|_| out_of_range(v, $name))
        };
        CompiledType {
            read: Decoder::new(|buf, offset, _| {
                let bytes = take(buf, offset)?;
                Ok(Decoded::new(
                    Value::Int(<$t>::$from(bytes) as i64),
                    std::mem::size_of::<$t>(),
                ))
            }),
            write: Encoder::new(move |value, dest, offset, _| {
                put(dest, offset, &check(value)?.$to())
            }),
            size_of: Sizer::fixed_checked(std::mem::size_of::<$t>(), move |value, _| {
                check(value).map(drop)
            }),
        }}
    };
}

macro_rules! float {
    ($name:literal, $t:ty, $from:ident, $to:ident) => {{
        let check = |value: &Value| -> Result<$t> { Ok(expect_f64(value, $name)? as $t) };
        CompiledType {
            read: Decoder::new(|buf, offset, _| {
                let bytes = take(buf, offset)?;
                Ok(Decoded::new(
                    Value::Float(<$t>::$from(bytes) as f64),
                    std::mem::size_of::<$t>(),
                ))
            }),
            write: Encoder::new(move |value, dest, offset, _| {
                put(dest, offset, &check(value)?.$to())
            }),
            size_of: Sizer::fixed_checked(std::mem::size_of::<$t>(), move |value, _| {
                check(value).map(drop)
            }),
        }}
    };
}

const VARINT_MAX_BYTES: usize = 5;

/// Reads an unsigned LEB128 varint of at most 32 bits.
pub(crate) fn read_varint(buf: &[u8], offset: usize) -> Result<(u32, usize)> {
    let mut result: u32 = 0;
    for i in 0..VARINT_MAX_BYTES {
        let [byte] = take::<1>(buf, offset + i)?;
        result |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    Err(Error::decode("varint is longer than 5 bytes"))
}

pub(crate) fn varint_len(mut v: u32) -> usize {
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

pub(crate) fn write_varint(dest: &mut [u8], mut offset: usize, mut v: u32) -> Result<usize> {
    while v >= 0x80 {
        offset = put(dest, offset, &[(v as u8 & 0x7f) | 0x80])?;
        v >>= 7;
    }
    put(dest, offset, &[v as u8])
}

/// Accepts the signed `i32` domain and the unsigned `u32` domain.
fn varint_bits(value: &Value) -> Result<u32> {
    let v = expect_i64(value, "varint")?;
    if let Ok(i) = i32::try_from(v) {
        Ok(i as u32)
    } else {
        u32::try_from(v).map_err(|_| out_of_range(v, "varint"))
    }
}

fn varint() -> CompiledType {
    CompiledType {
        read: Decoder::new(|buf, offset, _| {
            let (bits, size) = read_varint(buf, offset)?;
            Ok(Decoded::new(Value::Int(bits as i32 as i64), size))
        }),
        write: Encoder::new(|value, dest, offset, _| write_varint(dest, offset, varint_bits(value)?)),
        size_of: Sizer::new(|value, _| Ok(varint_len(varint_bits(value)?))),
    }
}

fn expect_bool(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::encode(format!("expected a bool, got {} {value}", value.kind())))
}

fn boolean() -> CompiledType {
    CompiledType {
        read: Decoder::new(|buf, offset, _| {
            let [b] = take::<1>(buf, offset)?;
            Ok(Decoded::new(Value::Bool(b != 0), 1))
        }),
        write: Encoder::new(|value, dest, offset, _| put(dest, offset, &[expect_bool(value)? as u8])),
        size_of: Sizer::fixed_checked(1, |value, _| expect_bool(value).map(drop)),
    }
}

/// Zero-width type; accepts any value on encode and writes nothing.
pub(crate) fn void() -> CompiledType {
    CompiledType {
        read: Decoder::new(|_, _, _| Ok(Decoded::new(Value::Null, 0))),
        write: Encoder::new(|_, _, offset, _| Ok(offset)),
        size_of: Sizer::fixed(0),
    }
}

/// Compiles a primitive scalar codec.
pub fn compile_primitive(primitive: Primitive) -> CompiledType {
    match primitive {
        Primitive::U8 => unsigned!("u8", u8, from_be_bytes, to_be_bytes),
        Primitive::U16 => unsigned!("u16", u16, from_be_bytes, to_be_bytes),
        Primitive::U32 => unsigned!("u32", u32, from_be_bytes, to_be_bytes),
        Primitive::U64 => unsigned!("u64", u64, from_be_bytes, to_be_bytes),
        Primitive::I8 => signed!("i8", i8, from_be_bytes, to_be_bytes),
        Primitive::I16 => signed!("i16", i16, from_be_bytes, to_be_bytes),
        Primitive::I32 => signed!("i32", i32, from_be_bytes, to_be_bytes),
        Primitive::I64 => signed!("i64", i64, from_be_bytes, to_be_bytes),
        Primitive::Lu16 => unsigned!("lu16", u16, from_le_bytes, to_le_bytes),
        Primitive::Lu32 => unsigned!("lu32", u32, from_le_bytes, to_le_bytes),
        Primitive::Lu64 => unsigned!("lu64", u64, from_le_bytes, to_le_bytes),
        Primitive::Li16 => signed!("li16", i16, from_le_bytes, to_le_bytes),
        Primitive::Li32 => signed!("li32", i32, from_le_bytes, to_le_bytes),
        Primitive::Li64 => signed!("li64", i64, from_le_bytes, to_le_bytes),
        Primitive::F32 => float!("f32", f32, from_be_bytes, to_be_bytes),
        Primitive::F64 => float!("f64", f64, from_be_bytes, to_be_bytes),
        Primitive::Lf32 => float!("lf32", f32, from_le_bytes, to_le_bytes),
        Primitive::Lf64 => float!("lf64", f64, from_le_bytes, to_le_bytes),
        Primitive::Bool => boolean(),
        Primitive::VarInt => varint(),
        Primitive::Void => void(),
    }
}
