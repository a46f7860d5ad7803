//! Container inlining: flattening anonymous fields into their parent.
//!
//! Runs once per container before its decoder, encoder, and sizer are
//! generated, so all three operations see the same field list in the same
//! order. Only one level is supported: anonymous fields found inside an
//! inlined type are rejected rather than flattened further.
//!
//! Schemas ported from ProtoDef implementations that pass such second-level
//! anonymous fields through unresolved fail here with `Error::Schema`
//! ("nested anonymous fields are not supported"). Name the inner field, or lift its fields
//! into the inlined container, before compiling.
//!
//! * An anonymous **container** has its fields spliced in place.
//! * An anonymous **switch** is transposed: for every field name appearing in
//!   any container branch, a new field of that name is synthesized whose type
//!   is a switch on the same discriminant (and with the same default). Each
//!   branch maps to the type of that-named field in its container, if it has
//!   one. A branch that is not a container is attached unmodified under every
//!   synthesized name.

use crate::error::{Error, Result};
use crate::schema::{Field, SwitchType, TypeNode};
use std::collections::HashSet;

/// Flattens one level of anonymous fields and checks name uniqueness.
pub fn inline_fields(fields: &[Field]) -> Result<Vec<Field>> {
    let mut flat = Vec::with_capacity(fields.len());
    for field in fields {
        if !field.anonymous {
            flat.push(field.clone());
            continue;
        }
        match &field.ty {
            TypeNode::Container(inner) => {
                for item in inner {
                    flat.push(named(item)?.clone());
                }
            }
            TypeNode::Switch(switch) => flat.extend(transpose(switch)?),
            other => {
                return Err(Error::schema(format!(
                    "cannot inline anonymous type: {}",
                    other.describe()
                )))
            }
        }
    }

    let mut seen = HashSet::with_capacity(flat.len());
    for field in &flat {
        if !seen.insert(field.name.as_str()) {
            return Err(Error::schema(format!(
                "duplicate field name after inlining: {}",
                field.name
            )));
        }
    }
    Ok(flat)
}

fn named(field: &Field) -> Result<&Field> {
    if field.anonymous {
        return Err(Error::schema(
            "nested anonymous fields are not supported (one inlining level only)",
        ));
    }
    Ok(field)
}

/// Rewrites a switch over containers into one switch per field name.
fn transpose(switch: &SwitchType) -> Result<Vec<Field>> {
    let mut names: Vec<&str> = Vec::new();
    for (_, branch) in &switch.fields {
        if let TypeNode::Container(inner) = branch {
            for item in inner {
                let item = named(item)?;
                if !names.contains(&item.name.as_str()) {
                    names.push(&item.name);
                }
            }
        }
    }

    let fields = names
        .into_iter()
        .map(|name| {
            let branches = switch
                .fields
                .iter()
                .filter_map(|(key, branch)| match branch {
                    TypeNode::Container(inner) => inner
                        .iter()
                        .find(|item| item.name == name)
                        .map(|item| (key.clone(), item.ty.clone())),
                    verbatim => Some((key.clone(), verbatim.clone())),
                })
                .collect();
            Field::new(
                name,
                SwitchType {
                    compare_to: switch.compare_to.clone(),
                    fields: branches,
                    default: switch.default.clone(),
                },
            )
        })
        .collect();
    Ok(fields)
}
