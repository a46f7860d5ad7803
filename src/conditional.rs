//! Switches, options, and length-prefixed leaves.

use crate::compiled::{CompiledType, Decoded, Decoder, Encoder, Scope, Sizer};
use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::native::{self, put, take, take_slice};
use crate::schema::{BufferType, Discriminant, Length, SwitchType, TypeNode};
use crate::structures::{fixed_count, length_from};
use crate::value::Value;
use std::sync::Arc;

//--- Switch ---

/// Canonical form of a branch key: `0x`-prefixed numbers become decimal.
fn normalize_key(key: &str) -> String {
    let hex = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"));
    match hex.and_then(|digits| u64::from_str_radix(digits, 16).ok()) {
        Some(n) => n.to_string(),
        None => key.to_owned(),
    }
}

/// Renders a discriminant value the way branch keys are written.
fn render_key(value: &Value) -> Option<String> {
    match value {
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

struct SwitchTable {
    compare_to: Discriminant,
    branches: Vec<(String, CompiledType)>,
    /// `void` when the schema gives no default.
    default: CompiledType,
}

impl SwitchTable {
    fn select(&self, scope: &Scope<'_>, fail: fn(String) -> Error) -> Result<&CompiledType> {
        let discriminant = match &self.compare_to {
            Discriminant::Value(v) => v,
            Discriminant::Field(path) => scope
                .lookup(path)
                .ok_or_else(|| fail(format!("switch discriminant `{path}` not found")))?,
        };
        let key = render_key(discriminant).ok_or_else(|| {
            fail(format!(
                "switch discriminant must be an integer, bool or string, got {}",
                discriminant.kind()
            ))
        })?;
        Ok(self
            .branches
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, ty)| ty)
            .unwrap_or(&self.default))
    }
}

/// Compiles a switch; every branch is compiled up front.
pub fn compile_switch(compiler: &mut Compiler<'_>, switch: &SwitchType) -> Result<CompiledType> {
    let mut branches: Vec<(String, CompiledType)> = Vec::with_capacity(switch.fields.len());
    for (key, ty) in &switch.fields {
        let key = normalize_key(key);
        if branches.iter().any(|(k, _)| *k == key) {
            return Err(Error::schema(format!("duplicate switch branch: {key}")));
        }
        branches.push((key, compiler.compile(ty)?));
    }
    let default = match &switch.default {
        Some(ty) => compiler.compile(ty)?,
        None => native::void(),
    };
    let table = Arc::new(SwitchTable {
        compare_to: switch.compare_to.clone(),
        branches,
        default,
    });

    let read = {
        let table = Arc::clone(&table);
        Decoder::new(move |buf, offset, scope| {
            table
                .select(scope, Error::decode)?
                .read
                .decode(buf, offset, scope)
        })
    };
    let write = {
        let table = Arc::clone(&table);
        Encoder::new(move |value, dest, offset, scope| {
            table
                .select(scope, Error::encode)?
                .write
                .encode(value, dest, offset, scope)
        })
    };
    let size_of = match common_fixed_size(&table) {
        Some(n) => Sizer::fixed_checked(n, move |value, scope| {
            table
                .select(scope, Error::encode)?
                .size_of
                .check(value, scope)
        }),
        None => Sizer::new(move |value, scope| {
            table
                .select(scope, Error::encode)?
                .size_of
                .size_of(value, scope)
        }),
    };
    Ok(CompiledType {
        read,
        write,
        size_of,
    })
}

/// Some(n) when every branch and the default are fixed at the same size.
fn common_fixed_size(table: &SwitchTable) -> Option<usize> {
    let size = table.default.size_of.fixed_size()?;
    table
        .branches
        .iter()
        .all(|(_, ty)| ty.size_of.fixed_size() == Some(size))
        .then_some(size)
}

//--- Option ---

/// A presence byte (0 = absent) followed by `inner` when present.
pub fn compile_option(compiler: &mut Compiler<'_>, inner: &TypeNode) -> Result<CompiledType> {
    let inner = compiler.compile(inner)?;
    let (r, w, s) = (inner.read, inner.write, inner.size_of);
    Ok(CompiledType {
        read: Decoder::new(move |buf, offset, scope| {
            let [present] = take::<1>(buf, offset)?;
            if present == 0 {
                return Ok(Decoded::new(Value::Null, 1));
            }
            let decoded = r.decode(buf, offset + 1, scope)?;
            Ok(Decoded::new(decoded.value, decoded.size + 1))
        }),
        write: Encoder::new(move |value, dest, offset, scope| {
            if value.is_null() {
                return put(dest, offset, &[0]);
            }
            let offset = put(dest, offset, &[1])?;
            w.encode(value, dest, offset, scope)
        }),
        size_of: Sizer::new(move |value, scope| {
            if value.is_null() {
                Ok(1)
            } else {
                Ok(1 + s.size_of(value, scope)?)
            }
        }),
    })
}

//--- Length-prefixed leaves ---

/// UTF-8 string prefixed by its byte length encoded as `count_type`.
pub fn compile_pstring(compiler: &mut Compiler<'_>, count_type: &TypeNode) -> Result<CompiledType> {
    let count = compiler.compile(count_type)?;
    let (read_count, write_count, size_count) = (count.read, count.write, count.size_of);
    Ok(CompiledType {
        read: Decoder::new(move |buf, offset, scope| {
            let prefix = read_count.decode(buf, offset, scope)?;
            let len = length_from(&prefix.value)?;
            let bytes = take_slice(buf, offset + prefix.size, len)?;
            let s = std::str::from_utf8(bytes)
                .map_err(|e| Error::decode(format!("invalid utf-8 in string: {e}")))?;
            Ok(Decoded::new(Value::String(s.to_owned()), prefix.size + len))
        }),
        write: Encoder::new(move |value, dest, offset, scope| {
            let s = expect_str(value)?;
            let offset = write_count.encode(&Value::from(s.len()), dest, offset, scope)?;
            put(dest, offset, s.as_bytes())
        }),
        size_of: Sizer::new(move |value, scope| {
            let s = expect_str(value)?;
            Ok(size_count.size_of(&Value::from(s.len()), scope)? + s.len())
        }),
    })
}

fn expect_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| Error::encode(format!("expected a string, got {}", value.kind())))
}

fn expect_bytes(value: &Value, expected: Option<usize>) -> Result<&[u8]> {
    let bytes = value
        .as_bytes()
        .ok_or_else(|| Error::encode(format!("expected bytes, got {}", value.kind())))?;
    match expected {
        Some(n) if n != bytes.len() => Err(Error::encode(format!(
            "buffer declares {n} bytes, got {}",
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}

/// Raw bytes with a fixed length or a length prefix.
pub fn compile_buffer(compiler: &mut Compiler<'_>, buffer: &BufferType) -> Result<CompiledType> {
    match buffer.length()? {
        Length::Fixed(n) => {
            let n = fixed_count(n)?;
            Ok(CompiledType {
                read: Decoder::new(move |buf, offset, _| {
                    let bytes = take_slice(buf, offset, n)?;
                    Ok(Decoded::new(Value::Bytes(bytes.to_vec()), n))
                }),
                write: Encoder::new(move |value, dest, offset, _| {
                    put(dest, offset, expect_bytes(value, Some(n))?)
                }),
                size_of: Sizer::new(move |value, _| Ok(expect_bytes(value, Some(n))?.len())),
            })
        }
        Length::Prefixed(count_type) => {
            let count = compiler.compile(count_type)?;
            let (read_count, write_count, size_count) = (count.read, count.write, count.size_of);
            Ok(CompiledType {
                read: Decoder::new(move |buf, offset, scope| {
                    let prefix = read_count.decode(buf, offset, scope)?;
                    let len = length_from(&prefix.value)?;
                    let bytes = take_slice(buf, offset + prefix.size, len)?;
                    Ok(Decoded::new(Value::Bytes(bytes.to_vec()), prefix.size + len))
                }),
                write: Encoder::new(move |value, dest, offset, scope| {
                    let bytes = expect_bytes(value, None)?;
                    let offset = write_count.encode(&Value::from(bytes.len()), dest, offset, scope)?;
                    put(dest, offset, bytes)
                }),
                size_of: Sizer::new(move |value, scope| {
                    let bytes = expect_bytes(value, None)?;
                    Ok(size_count.size_of(&Value::from(bytes.len()), scope)? + bytes.len())
                }),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Primitive};
    use crate::value::Record;
    use crate::Protocol;

    fn compile(node: TypeNode) -> CompiledType {
        Protocol::new().compiler().compile(&node).unwrap()
    }

    #[test]
    fn hex_keys_are_normalized() {
        assert_eq!(normalize_key("0x10"), "16");
        assert_eq!(normalize_key("login"), "login");
        assert_eq!(normalize_key("0xzz"), "0xzz");
    }

    #[test]
    fn switch_selects_branch_by_sibling_field() {
        let codec = compile(TypeNode::container([
            Field::new("kind", Primitive::U8),
            Field::new(
                "body",
                SwitchType::on("kind")
                    .branch("0x01", Primitive::U8)
                    .branch("2", Primitive::U16),
            ),
        ]));
        let one = codec.decode(&[1, 7]).unwrap();
        assert_eq!(one.size, 2);
        let two = codec.decode(&[2, 0, 7]).unwrap();
        assert_eq!(two.size, 3);
        assert_eq!(
            two.value,
            Value::Record(Record::new().with("kind", 2u8).with("body", 7u16))
        );
    }

    #[test]
    fn unmatched_discriminant_without_default_is_void() {
        let codec = compile(TypeNode::container([
            Field::new("kind", Primitive::U8),
            Field::new("body", SwitchType::on("kind").branch("1", Primitive::U8)),
        ]));
        let decoded = codec.decode(&[9, 0xaa]).unwrap();
        assert_eq!(decoded.size, 1);
        assert_eq!(decoded.value.as_record().unwrap().get("body"), Some(&Value::Null));
    }

    #[test]
    fn default_branch_applies() {
        let codec = compile(TypeNode::container([
            Field::new("kind", Primitive::U8),
            Field::new(
                "body",
                SwitchType::on("kind")
                    .branch("1", Primitive::U8)
                    .with_default(Primitive::U16),
            ),
        ]));
        assert_eq!(codec.decode(&[9, 0, 1]).unwrap().size, 3);
    }

    #[test]
    fn constant_discriminant() {
        let codec = compile(TypeNode::Switch(SwitchType {
            compare_to: Discriminant::Value(Value::from("big")),
            fields: vec![
                ("small".into(), Primitive::U8.into()),
                ("big".into(), Primitive::U32.into()),
            ],
            default: None,
        }));
        assert_eq!(codec.size_of.fixed_size(), None);
        assert_eq!(codec.decode(&[0, 0, 0, 5]).unwrap().value, Value::UInt(5));
    }

    #[test]
    fn uniform_size_switch_still_checks_the_branch() {
        let codec = compile(TypeNode::container([
            Field::new("kind", Primitive::U8),
            Field::new(
                "body",
                SwitchType::on("kind")
                    .branch("1", Primitive::U16)
                    .with_default(Primitive::Li16),
            ),
        ]));
        let bad: Value = Record::new().with("kind", 1u8).with("body", "text").into();
        let measured = codec.measure(&bad).unwrap_err();
        assert!(matches!(measured, Error::Encode { .. }));
        assert!(measured.to_string().contains("body"), "{measured}");

        let good: Value = Record::new().with("kind", 1u8).with("body", 9u16).into();
        assert_eq!(codec.measure(&good).unwrap(), 3);
    }

    #[test]
    fn missing_discriminant_field_is_decode_error() {
        let codec = compile(SwitchType::on("nope").branch("1", Primitive::U8).into());
        assert!(matches!(codec.decode(&[1]), Err(Error::Decode { .. })));
    }

    #[test]
    fn option_roundtrip() {
        let codec = compile(TypeNode::option(Primitive::U16.into()));
        assert_eq!(codec.encode(&Value::Null).unwrap(), vec![0]);
        assert_eq!(codec.encode(&Value::from(5u16)).unwrap(), vec![1, 0, 5]);
        assert_eq!(codec.decode(&[1, 0, 5]).unwrap().value, Value::UInt(5));
    }

    #[test]
    fn pstring_roundtrip_and_invalid_utf8() {
        let codec = compile(TypeNode::pstring(Primitive::VarInt.into()));
        let bytes = codec.encode(&Value::from("héllo")).unwrap();
        assert_eq!(bytes[0] as usize, "héllo".len());
        assert_eq!(codec.decode(&bytes).unwrap().value, Value::from("héllo"));
        assert!(matches!(
            codec.decode(&[2, 0xff, 0xfe]),
            Err(Error::Decode { .. })
        ));
        assert!(codec.decode(&[4, b'a']).unwrap_err().is_partial_read());
    }

    #[test]
    fn buffers_fixed_and_prefixed() {
        let fixed = compile(TypeNode::Buffer(BufferType {
            count: Some(2),
            count_type: None,
        }));
        assert_eq!(fixed.encode(&Value::Bytes(vec![9, 8])).unwrap(), vec![9, 8]);
        assert!(fixed.encode(&Value::Bytes(vec![9])).is_err());

        let prefixed = compile(TypeNode::Buffer(BufferType {
            count: None,
            count_type: Some(Box::new(Primitive::U8.into())),
        }));
        assert_eq!(
            prefixed.encode(&Value::Bytes(vec![9, 8])).unwrap(),
            vec![2, 9, 8]
        );
    }
}
