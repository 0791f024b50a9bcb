//! The scalar codec registry: one encode/decode/size triple per wire type.
//!
//! Every field of every message is one of eleven primitive scalars. Each
//! scalar knows three things:
//!
//! - how many bytes a value takes on the wire (`size`),
//! - how to append those bytes to a buffer (`encode`),
//! - how to read a value back from a cursor (`decode`).
//!
//! The law tying them together: `size(v)` is exactly the number of bytes
//! `encode` writes for `v`, and `decode(encode(v)) == v`.
//!
//! ```text
//! u8 u16 u32 u64 i8 i16 i32 i64 f32 f64   fixed width, little-endian
//! String                                  [len: u16 LE][len bytes UTF-8]
//! ```
//!
//! The per-type work lives in the [`Scalar`] trait, implemented for the
//! real Rust primitives. [`ScalarType`] is the runtime registry: schema
//! tables name their fields with it, and it dispatches to the right
//! `Scalar` impl for a dynamically typed [`Value`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Largest `String` payload the 2-byte length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Runs `$body` with `$v` bound to the typed payload of a [`Value`].
macro_rules! with_scalar {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            Value::String($v) => $body,
            Value::U8($v) => $body,
            Value::U16($v) => $body,
            Value::U32($v) => $body,
            Value::U64($v) => $body,
            Value::I8($v) => $body,
            Value::I16($v) => $body,
            Value::I32($v) => $body,
            Value::I64($v) => $body,
            Value::F32($v) => $body,
            Value::F64($v) => $body,
        }
    };
}

// ---------------------------------------------------------------------------
// Reader: the decode cursor
// ---------------------------------------------------------------------------

/// A cursor over an inbound buffer.
///
/// Every read is bounds-checked. Running off the end is a
/// [`ProtocolError::TruncatedFrame`], never a zero or an empty value.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Starts reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consumes the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(ProtocolError::TruncatedFrame {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Consumes the next `N` bytes as a fixed-size array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Scalar: per-primitive codec
// ---------------------------------------------------------------------------

/// A Rust type that has a wire representation.
pub trait Scalar: Sized {
    /// The registry entry for this type.
    const TYPE: ScalarType;

    /// Number of bytes [`encode_into`](Self::encode_into) appends.
    fn encoded_len(&self) -> usize;

    /// Appends the wire bytes for `self` to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError>;

    /// Reads one value from the cursor.
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, ProtocolError>;
}

impl Scalar for String {
    const TYPE: ScalarType = ScalarType::String;

    fn encoded_len(&self) -> usize {
        // Byte length, not character count.
        2 + self.len()
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let len = u16::try_from(self.len()).map_err(|_| {
            ProtocolError::SizeLimitExceeded {
                len: self.len(),
                max: MAX_STRING_LEN,
            }
        })?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let len = u16::from_le_bytes(reader.array()?) as usize;
        let bytes = reader.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(ProtocolError::InvalidUtf8)
    }
}

/// Implements [`Scalar`] and the [`Value`] conversions for the fixed-width
/// numeric types. They all share the same shape: `to_le_bytes` out,
/// `from_le_bytes` in, size is `size_of::<T>()`.
macro_rules! fixed_width_scalars {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const TYPE: ScalarType = ScalarType::$variant;

                fn encoded_len(&self) -> usize {
                    std::mem::size_of::<$ty>()
                }

                fn encode_into(
                    &self,
                    buf: &mut Vec<u8>,
                ) -> Result<(), ProtocolError> {
                    buf.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }

                fn decode_from(
                    reader: &mut Reader<'_>,
                ) -> Result<Self, ProtocolError> {
                    Ok(<$ty>::from_le_bytes(reader.array()?))
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = ProtocolError;

                fn try_from(value: Value) -> Result<Self, ProtocolError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(ProtocolError::TypeMismatch {
                            expected: ScalarType::$variant,
                            found: other.scalar_type(),
                        }),
                    }
                }
            }
        )*
    };
}

fixed_width_scalars! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

// ---------------------------------------------------------------------------
// ScalarType: the registry
// ---------------------------------------------------------------------------

/// The name of a wire type, as it appears in a message layout.
///
/// Serializes as the protocol's type names (`"String"`, `"u8"`, …) so a
/// JSON schema descriptor reads the same as the browser client's tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum ScalarType {
    #[serde(rename = "String")]
    String,
    #[serde(rename = "u8")]
    U8,
    #[serde(rename = "u16")]
    U16,
    #[serde(rename = "u32")]
    U32,
    #[serde(rename = "u64")]
    U64,
    #[serde(rename = "i8")]
    I8,
    #[serde(rename = "i16")]
    I16,
    #[serde(rename = "i32")]
    I32,
    #[serde(rename = "i64")]
    I64,
    #[serde(rename = "f32")]
    F32,
    #[serde(rename = "f64")]
    F64,
}

impl ScalarType {
    /// Every registered scalar, in declaration order.
    pub const ALL: [ScalarType; 11] = [
        Self::String,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::F32,
        Self::F64,
    ];

    /// The wire name used in layouts.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Width in bytes for fixed-width types, `None` for `String`.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::String => None,
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
        }
    }

    /// The fewest bytes a value of this type can occupy.
    pub fn min_size(self) -> usize {
        self.fixed_size().unwrap_or(2)
    }

    /// Encoded size of `value` as this type.
    ///
    /// # Errors
    /// `TypeMismatch` if `value` is a different type, `SizeLimitExceeded`
    /// for an over-long string.
    pub fn size(self, value: &Value) -> Result<usize, ProtocolError> {
        self.check(value)?;
        if let Value::String(s) = value {
            if s.len() > MAX_STRING_LEN {
                return Err(ProtocolError::SizeLimitExceeded {
                    len: s.len(),
                    max: MAX_STRING_LEN,
                });
            }
        }
        Ok(with_scalar!(value, v => v.encoded_len()))
    }

    /// Appends `value` to `buf` as this type.
    pub fn encode(
        self,
        value: &Value,
        buf: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        self.check(value)?;
        with_scalar!(value, v => v.encode_into(buf))
    }

    /// Reads one value of this type from the cursor.
    pub fn decode(self, reader: &mut Reader<'_>) -> Result<Value, ProtocolError> {
        Ok(match self {
            Self::String => Value::String(String::decode_from(reader)?),
            Self::U8 => Value::U8(u8::decode_from(reader)?),
            Self::U16 => Value::U16(u16::decode_from(reader)?),
            Self::U32 => Value::U32(u32::decode_from(reader)?),
            Self::U64 => Value::U64(u64::decode_from(reader)?),
            Self::I8 => Value::I8(i8::decode_from(reader)?),
            Self::I16 => Value::I16(i16::decode_from(reader)?),
            Self::I32 => Value::I32(i32::decode_from(reader)?),
            Self::I64 => Value::I64(i64::decode_from(reader)?),
            Self::F32 => Value::F32(f32::decode_from(reader)?),
            Self::F64 => Value::F64(f64::decode_from(reader)?),
        })
    }

    fn check(self, value: &Value) -> Result<(), ProtocolError> {
        let found = value.scalar_type();
        if found == self {
            Ok(())
        } else {
            Err(ProtocolError::TypeMismatch {
                expected: self,
                found,
            })
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| {
                ProtocolError::InvalidSchema(format!("unknown scalar type `{s}`"))
            })
    }
}

// ---------------------------------------------------------------------------
// Value: one decoded field
// ---------------------------------------------------------------------------

/// A single field value, tagged with its wire type.
///
/// 64-bit integers stay 64-bit integers: there is no float in the path,
/// so values above 2^53 survive the round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// The wire type of this value.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::String(_) => ScalarType::String,
            Self::U8(_) => ScalarType::U8,
            Self::U16(_) => ScalarType::U16,
            Self::U32(_) => ScalarType::U32,
            Self::U64(_) => ScalarType::U64,
            Self::I8(_) => ScalarType::I8,
            Self::I16(_) => ScalarType::I16,
            Self::I32(_) => ScalarType::I32,
            Self::I64(_) => ScalarType::I64,
            Self::F32(_) => ScalarType::F32,
            Self::F64(_) => ScalarType::F64,
        }
    }

    /// Borrows the string payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl TryFrom<Value> for String {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ProtocolError::TypeMismatch {
                expected: ScalarType::String,
                found: other.scalar_type(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            other => with_scalar!(other, v => write!(f, "{v}")),
        }
    }
}
