use crate::value::Value;
use thiserror::Error;

/// Error types for schema compilation, codecs, and packet framing.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O errors from std::io operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally invalid type node, raised while compiling.
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// Not enough bytes yet. The bytes seen so far are not invalid.
    #[error("Partial read: needed {needed} bytes, {available} available")]
    PartialRead { needed: usize, available: usize },

    /// Any decode failure other than a partial read.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// The value does not match the shape the schema expects.
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// The incremental parser hit a structural error and dropped its buffer.
    #[error("discarded {} buffered bytes: {source}", .buffer.len())]
    Discarded {
        buffer: Vec<u8>,
        #[source]
        source: Box<Error>,
    },

    /// The serializer could not encode a packet; nothing was emitted.
    #[error("packet could not be serialized: {source}")]
    Unserializable {
        packet: Box<Value>,
        #[source]
        source: Box<Error>,
    },

    /// A partial packet grew past the configured accumulator limit.
    #[error("Buffered {buffered} bytes without a complete packet (limit {limit})")]
    BufferOverflow { buffered: usize, limit: usize },

    /// End of input reached with a partial packet still buffered.
    #[error("Unexpected end of stream with {buffered} bytes buffered")]
    UnexpectedEof { buffered: usize },
}

impl Error {
    /// Create a new `Schema` error with a descriptive message.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a new `Decode` error with a descriptive message.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a new `Encode` error with a descriptive message.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Create a new `PartialRead` error.
    pub fn partial_read(needed: usize, available: usize) -> Self {
        Self::PartialRead { needed, available }
    }

    /// True when the failure only means "wait for more bytes".
    pub fn is_partial_read(&self) -> bool {
        matches!(self, Self::PartialRead { .. })
    }

    /// The innermost error, looking through the framer's context wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Discarded { source, .. } | Self::Unserializable { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Result type alias for the library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_read_is_distinguished() {
        assert!(Error::partial_read(4, 2).is_partial_read());
        assert!(!Error::decode("bad").is_partial_read());
    }

    #[test]
    fn root_cause_unwraps_context() {
        let err = Error::Discarded {
            buffer: vec![1, 2, 3],
            source: Box::new(Error::decode("bad length")),
        };
        assert!(matches!(err.root_cause(), Error::Decode { .. }));
        assert_eq!(
            err.to_string(),
            "discarded 3 buffered bytes: Decode error: bad length"
        );
    }
}
