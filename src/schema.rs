//! Type nodes describing a binary wire format.
//!
//! A schema is a tree of [`TypeNode`]s. Composite nodes (arrays, containers,
//! switches) are compiled by the structural compiler; leaves are primitive
//! codecs or references to named types registered on a
//! [`Protocol`](crate::Protocol).

use crate::value::Value;

/// One piece of binary layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TypeNode {
    /// Reference to a named type (registered or primitive) resolved at compile time.
    Ref(String),
    /// Fixed-layout scalar.
    Primitive(Primitive),
    /// Length-prefixed UTF-8 string.
    PString { count_type: Box<TypeNode> },
    /// Raw bytes with a fixed or prefixed length.
    Buffer(BufferType),
    /// One presence byte followed by the inner type when present.
    Option(Box<TypeNode>),
    Array(ArrayType),
    Container(Vec<Field>),
    Switch(SwitchType),
}

impl TypeNode {
    pub fn named(name: impl Into<String>) -> Self {
        TypeNode::Ref(name.into())
    }

    pub fn container(fields: impl IntoIterator<Item = Field>) -> Self {
        TypeNode::Container(fields.into_iter().collect())
    }

    pub fn pstring(count_type: TypeNode) -> Self {
        TypeNode::PString {
            count_type: Box::new(count_type),
        }
    }

    pub fn option(inner: TypeNode) -> Self {
        TypeNode::Option(Box::new(inner))
    }

    pub fn fixed_array(element: TypeNode, count: u64) -> Self {
        TypeNode::Array(ArrayType::fixed(element, count))
    }

    pub fn prefixed_array(element: TypeNode, count_type: TypeNode) -> Self {
        TypeNode::Array(ArrayType::prefixed(element, count_type))
    }

    /// Short description used in schema error messages.
    pub fn describe(&self) -> String {
        match self {
            TypeNode::Ref(name) => name.clone(),
            TypeNode::Primitive(p) => p.name().to_owned(),
            TypeNode::PString { .. } => "pstring".to_owned(),
            TypeNode::Buffer(_) => "buffer".to_owned(),
            TypeNode::Option(_) => "option".to_owned(),
            TypeNode::Array(_) => "array".to_owned(),
            TypeNode::Container(_) => "container".to_owned(),
            TypeNode::Switch(_) => "switch".to_owned(),
        }
    }
}

impl From<Primitive> for TypeNode {
    fn from(p: Primitive) -> Self {
        TypeNode::Primitive(p)
    }
}

/// Scalar codecs with no parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Primitive {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Lu16,
    Lu32,
    Lu64,
    Li16,
    Li32,
    Li64,
    F32,
    F64,
    Lf32,
    Lf64,
    Bool,
    /// Unsigned LEB128 over 32 bits, read back as a signed `i32`.
    VarInt,
    /// Zero bytes; decodes to `Null`.
    Void,
}

impl Primitive {
    pub const ALL: [Primitive; 21] = [
        Primitive::U8,
        Primitive::U16,
        Primitive::U32,
        Primitive::U64,
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::Lu16,
        Primitive::Lu32,
        Primitive::Lu64,
        Primitive::Li16,
        Primitive::Li32,
        Primitive::Li64,
        Primitive::F32,
        Primitive::F64,
        Primitive::Lf32,
        Primitive::Lf64,
        Primitive::Bool,
        Primitive::VarInt,
        Primitive::Void,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::Lu16 => "lu16",
            Primitive::Lu32 => "lu32",
            Primitive::Lu64 => "lu64",
            Primitive::Li16 => "li16",
            Primitive::Li32 => "li32",
            Primitive::Li64 => "li64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::Lf32 => "lf32",
            Primitive::Lf64 => "lf64",
            Primitive::Bool => "bool",
            Primitive::VarInt => "varint",
            Primitive::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// An array of `element`, with exactly one of `count` / `count_type`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayType {
    pub element: Box<TypeNode>,
    /// Fixed element count; nothing is written on the wire.
    #[cfg_attr(feature = "serde", serde(default))]
    pub count: Option<u64>,
    /// Type of the length prefix written before the elements.
    #[cfg_attr(feature = "serde", serde(default))]
    pub count_type: Option<Box<TypeNode>>,
}

impl ArrayType {
    pub fn fixed(element: TypeNode, count: u64) -> Self {
        Self {
            element: Box::new(element),
            count: Some(count),
            count_type: None,
        }
    }

    pub fn prefixed(element: TypeNode, count_type: TypeNode) -> Self {
        Self {
            element: Box::new(element),
            count: None,
            count_type: Some(Box::new(count_type)),
        }
    }

    /// Resolves the length mode; a schema error unless exactly one is set.
    pub fn length(&self) -> crate::Result<Length<'_>> {
        length_of(self.count, self.count_type.as_deref(), "Array")
    }
}

/// Raw byte buffer, sized like an array of `u8`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferType {
    #[cfg_attr(feature = "serde", serde(default))]
    pub count: Option<u64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub count_type: Option<Box<TypeNode>>,
}

impl BufferType {
    pub fn length(&self) -> crate::Result<Length<'_>> {
        length_of(self.count, self.count_type.as_deref(), "Buffer")
    }
}

/// Resolved length mode of an array or buffer.
#[derive(Debug, Clone, Copy)]
pub enum Length<'a> {
    Fixed(u64),
    Prefixed(&'a TypeNode),
}

fn length_of<'a>(
    count: Option<u64>,
    count_type: Option<&'a TypeNode>,
    what: &str,
) -> crate::Result<Length<'a>> {
    match (count, count_type) {
        (Some(n), None) => Ok(Length::Fixed(n)),
        (None, Some(t)) => Ok(Length::Prefixed(t)),
        (None, None) => Err(crate::Error::schema(format!(
            "{what} must contain either count or count_type"
        ))),
        (Some(_), Some(_)) => Err(crate::Error::schema(format!(
            "{what} must not contain both count and count_type"
        ))),
    }
}

/// A named (or anonymous) member of a container.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub ty: TypeNode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub anonymous: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeNode>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            anonymous: false,
        }
    }

    /// A field whose type is spliced into the parent container.
    pub fn anonymous(ty: impl Into<TypeNode>) -> Self {
        Self {
            name: String::new(),
            ty: ty.into(),
            anonymous: true,
        }
    }
}

/// Where a switch reads its discriminant from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Discriminant {
    /// Path to a field of an enclosing container, e.g. `kind` or `../header/kind`.
    Field(String),
    /// Externally supplied constant.
    Value(Value),
}

/// Discriminated union selecting a branch type by a discriminant value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchType {
    pub compare_to: Discriminant,
    /// Branches in declaration order, keyed by the rendered discriminant.
    pub fields: Vec<(String, TypeNode)>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub default: Option<Box<TypeNode>>,
}

impl SwitchType {
    /// Switch over a sibling field.
    pub fn on(path: impl Into<String>) -> Self {
        Self {
            compare_to: Discriminant::Field(path.into()),
            fields: Vec::new(),
            default: None,
        }
    }

    pub fn branch(mut self, key: impl Into<String>, ty: impl Into<TypeNode>) -> Self {
        self.fields.push((key.into(), ty.into()));
        self
    }

    pub fn with_default(mut self, ty: impl Into<TypeNode>) -> Self {
        self.default = Some(Box::new(ty.into()));
        self
    }
}

impl From<SwitchType> for TypeNode {
    fn from(s: SwitchType) -> Self {
        TypeNode::Switch(s)
    }
}

impl From<ArrayType> for TypeNode {
    fn from(a: ArrayType) -> Self {
        TypeNode::Array(a)
    }
}
