//! Error types for the protocol layer.
//!
//! Each crate in Exowire defines its own error enum. This keeps errors
//! specific and meaningful: when you see a `ProtocolError`, you know
//! the problem is in framing, the schema tables, or dispatch, not in
//! networking.

use crate::ScalarType;

/// Boxed error returned by application handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the protocol layer.
///
/// The variants split into three groups:
///
/// - **Framing** (`UnknownTag`, `TruncatedFrame`, `TrailingBytes`,
///   `InvalidUtf8`): the inbound byte stream no longer lines up with the
///   schema. See [`ProtocolError::is_desync`].
/// - **Caller contract** (`UnknownMessage`, `ArityMismatch`,
///   `TypeMismatch`, `SizeLimitExceeded`): an outbound call was wrong.
///   Nothing is sent.
/// - **Dispatch** (`NoHandler`, `HandlerFailed`): the frame was fine but
///   the application could not consume it.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The tag byte has no matching definition in the inbound table.
    #[error("unknown tag {0}")]
    UnknownTag(u8),

    /// Decoding ran past the end of the buffer.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    TruncatedFrame { needed: usize, available: usize },

    /// Decoding finished with bytes still unread.
    #[error("{extra} trailing bytes after `{message}` frame")]
    TrailingBytes { message: String, extra: usize },

    /// A `String` field did not contain valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    /// Encode was asked for a name absent from the outbound table.
    #[error("no such message: {0}")]
    UnknownMessage(String),

    /// Encode received a different number of values than the layout has.
    #[error("`{message}` takes {expected} fields, got {actual}")]
    ArityMismatch {
        message: String,
        expected: usize,
        actual: usize,
    },

    /// A value's type does not match the scalar type at its position.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: ScalarType,
        found: ScalarType,
    },

    /// A `String` is too long for its 2-byte length prefix.
    #[error("string of {len} bytes exceeds the {max} byte limit")]
    SizeLimitExceeded { len: usize, max: usize },

    /// A schema table failed start-up validation.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A schema descriptor could not be parsed.
    #[cfg(feature = "json")]
    #[error("schema descriptor is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// A valid frame arrived but nothing is registered for its name.
    #[error("no handler registered for `{0}`")]
    NoHandler(String),

    /// The registered handler returned an error.
    #[error("handler for `{message}` failed: {source}")]
    HandlerFailed {
        message: String,
        #[source]
        source: BoxError,
    },
}

impl ProtocolError {
    /// Returns `true` if the inbound stream can no longer be trusted.
    ///
    /// With tag-by-position framing there is no way to resynchronise after
    /// a bad frame, so sessions close when they see one of these.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            Self::UnknownTag(_)
                | Self::TruncatedFrame { .. }
                | Self::TrailingBytes { .. }
                | Self::InvalidUtf8(_)
        )
    }
}
