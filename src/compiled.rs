//! Compiled operations: the invocable units produced for each type node.
//!
//! Every type node compiles to three operations, one per intent:
//!
//! * [`Decoder`]: `(bytes, offset, scope) -> Decoded { value, size }`
//! * [`Encoder`]: `(value, dest, offset, scope) -> ending offset`
//! * [`Sizer`]: `(value, scope) -> byte count`
//!
//! Operations are `Arc`-shared closures with no state of their own, so a
//! [`CompiledType`] can be cloned freely and used from many threads at once.
//! All mutable state (the source buffer, the destination, the running offset)
//! is passed in by the caller.

use crate::error::{Error, Result};
use crate::value::{Record, Value};
use std::fmt;
use std::sync::Arc;

/// The value decoded from one type node and the bytes it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub size: usize,
}

impl Decoded {
    pub fn new(value: Value, size: usize) -> Self {
        Self { value, size }
    }
}

/// Chain of enclosing container records visible to a running operation.
///
/// Switches resolve their discriminant through the scope: the innermost frame
/// is the container currently being decoded (holding the fields decoded so
/// far) or encoded (the caller's record).
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    frame: Option<&'a Record>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// Scope with no enclosing container.
    pub const fn root() -> Self {
        Self {
            frame: None,
            parent: None,
        }
    }

    /// A new innermost frame nested in `self`.
    pub fn child(&'a self, record: &'a Record) -> Scope<'a> {
        Scope {
            frame: Some(record),
            parent: Some(self),
        }
    }

    /// Resolves a `/`-separated path. `..` steps out to the enclosing
    /// container; other segments name fields, descending into nested records.
    pub fn lookup(&self, path: &str) -> Option<&'a Value> {
        let mut scope: Scope<'a> = *self;
        let mut segments = path.split('/').filter(|s| !s.is_empty() && *s != ".");
        let first = loop {
            match segments.next()? {
                ".." => scope = *scope.parent?,
                name => break name,
            }
        };
        let mut value = scope.frame?.get(first)?;
        for segment in segments {
            value = value.as_record()?.get(segment)?;
        }
        Some(value)
    }
}

type ReadFn = dyn Fn(&[u8], usize, &Scope<'_>) -> Result<Decoded> + Send + Sync;
type WriteFn = dyn Fn(&Value, &mut [u8], usize, &Scope<'_>) -> Result<usize> + Send + Sync;
type SizeFn = dyn Fn(&Value, &Scope<'_>) -> Result<usize> + Send + Sync;

/// Decode intent of a compiled type.
#[derive(Clone)]
pub struct Decoder(Arc<ReadFn>);

impl Decoder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[u8], usize, &Scope<'_>) -> Result<Decoded> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn decode(&self, buffer: &[u8], offset: usize, scope: &Scope<'_>) -> Result<Decoded> {
        (self.0)(buffer, offset, scope)
    }
}

/// Encode intent of a compiled type. Returns the offset after the written bytes.
#[derive(Clone)]
pub struct Encoder(Arc<WriteFn>);

impl Encoder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &mut [u8], usize, &Scope<'_>) -> Result<usize> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn encode(
        &self,
        value: &Value,
        dest: &mut [u8],
        offset: usize,
        scope: &Scope<'_>,
    ) -> Result<usize> {
        (self.0)(value, dest, offset, scope)
    }
}

/// Measure intent of a compiled type.
///
/// `fixed_size()` is a static query: `Some(n)` only when every value of the
/// type encodes to exactly `n` bytes, known without looking at a value.
#[derive(Clone)]
pub struct Sizer {
    fixed: Option<usize>,
    op: Arc<SizeFn>,
}

impl Sizer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &Scope<'_>) -> Result<usize> + Send + Sync + 'static,
    {
        Self {
            fixed: None,
            op: Arc::new(f),
        }
    }

    /// A sizer for a type whose encoding is always `size` bytes and which
    /// accepts any value (void).
    pub fn fixed(size: usize) -> Self {
        Self {
            fixed: Some(size),
            op: Arc::new(move |_, _| Ok(size)),
        }
    }

    /// Like [`Sizer::fixed`], but `validate` must accept the value first.
    /// Measure then rejects what the matching encoder rejects while
    /// `fixed_size()` stays static.
    pub fn fixed_checked<F>(size: usize, validate: F) -> Self
    where
        F: Fn(&Value, &Scope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            fixed: Some(size),
            op: Arc::new(move |value, scope| {
                validate(value, scope)?;
                Ok(size)
            }),
        }
    }

    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed
    }

    #[inline]
    pub fn size_of(&self, value: &Value, scope: &Scope<'_>) -> Result<usize> {
        (self.op)(value, scope)
    }

    /// Runs the measure for its errors only.
    #[inline]
    pub fn check(&self, value: &Value, scope: &Scope<'_>) -> Result<()> {
        self.size_of(value, scope).map(drop)
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Decoder")
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Encoder")
    }
}

impl fmt::Debug for Sizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sizer").field("fixed", &self.fixed).finish()
    }
}

/// The three operations compiled from one type node.
#[derive(Debug, Clone)]
pub struct CompiledType {
    pub read: Decoder,
    pub write: Encoder,
    pub size_of: Sizer,
}

impl CompiledType {
    /// Decodes one value from the start of `buffer`.
    pub fn decode(&self, buffer: &[u8]) -> Result<Decoded> {
        self.read.decode(buffer, 0, &Scope::root())
    }

    /// Measures `value`.
    pub fn measure(&self, value: &Value) -> Result<usize> {
        self.size_of.size_of(value, &Scope::root())
    }

    /// Measures, allocates, and encodes `value` into a new buffer.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let size = self.measure(value)?;
        let mut out = vec![0u8; size];
        let end = self.write.encode(value, &mut out, 0, &Scope::root())?;
        if end != size {
            return Err(Error::encode(format!(
                "encoded {end} bytes but measured {size}"
            )));
        }
        Ok(out)
    }
}
