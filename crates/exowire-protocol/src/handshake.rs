//! The `Test` handshake: a canonical vector of boundary values.
//!
//! Right after connecting, both peers send a `Test` message carrying the
//! same literals. Each side decodes the other's and compares field by
//! field. If the codecs or tables disagree anywhere (endianness, a
//! reordered table, a float path that loses 64-bit precision) the values
//! will not match.
//!
//! The last field is the sender's protocol version, so a stale client
//! shows up as a single mismatch at index 11.
//!
//! A mismatch is advisory: [`verify`] reports it, and the caller decides
//! whether to carry on.

use std::fmt;

use crate::{ProtocolError, ScalarType, Value};

/// Name of the handshake message in both tables.
pub const TEST_MESSAGE: &str = "Test";

/// Marker string at the start of the vector.
pub const TEST_MARKER: &str = "EXOSPHERE";

/// Layout the `Test` message must have in both directions.
pub const TEST_LAYOUT: &[ScalarType] = &[
    ScalarType::String,
    ScalarType::U8,
    ScalarType::U16,
    ScalarType::U32,
    ScalarType::U64,
    ScalarType::I8,
    ScalarType::I16,
    ScalarType::I32,
    ScalarType::I64,
    ScalarType::F32,
    ScalarType::F64,
    ScalarType::U8,
];

/// The canonical handshake values, ending with `version`.
pub fn canonical_values(version: u8) -> Vec<Value> {
    vec![
        Value::from(TEST_MARKER),
        Value::U8(128),
        Value::U16(4096),
        Value::U32(115_600),
        Value::U64(123_456_789_012_345),
        Value::I8(-64),
        Value::I16(-4096),
        Value::I32(-115_600),
        Value::I64(-123_456_789_012_345),
        // Exactly representable in f32.
        Value::F32(-4096.512_207_031_25),
        Value::F64(-8192.756),
        Value::U8(version),
    ]
}

/// One field that did not match.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMismatch {
    pub index: usize,
    pub expected: Value,
    /// `None` when the peer sent fewer fields.
    pub received: Option<Value>,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.received {
            Some(received) => write!(
                f,
                "field {}: expected {}, received {}",
                self.index, self.expected, received
            ),
            None => write!(
                f,
                "field {}: expected {}, received nothing",
                self.index, self.expected
            ),
        }
    }
}

/// Outcome of comparing a peer's `Test` against ours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandshakeReport {
    pub mismatches: Vec<FieldMismatch>,
    /// Fields the peer sent beyond the canonical vector.
    pub extra_fields: usize,
}

impl HandshakeReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty() && self.extra_fields == 0
    }

    /// The peer's protocol version, if the trailing field mismatched only
    /// because the versions differ.
    pub fn peer_version(&self) -> Option<u8> {
        self.mismatches.iter().find_map(|m| match (m.index, &m.received) {
            (11, Some(Value::U8(v))) => Some(*v),
            _ => None,
        })
    }
}

impl fmt::Display for HandshakeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return f.write_str("handshake passed");
        }
        write!(f, "handshake failed:")?;
        for m in &self.mismatches {
            write!(f, " [{m}]")?;
        }
        if self.extra_fields > 0 {
            write!(f, " [{} extra fields]", self.extra_fields)?;
        }
        Ok(())
    }
}

/// Compares `received` against the canonical vector for `version`.
///
/// Floats are compared bit-for-bit: the codec must reproduce them
/// exactly.
pub fn verify(received: &[Value], version: u8) -> HandshakeReport {
    let expected = canonical_values(version);
    let mismatches = expected
        .iter()
        .enumerate()
        .filter_map(|(index, want)| {
            let got = received.get(index);
            let same = got.is_some_and(|got| same_bits(want, got));
            (!same).then(|| FieldMismatch {
                index,
                expected: want.clone(),
                received: got.cloned(),
            })
        })
        .collect();

    HandshakeReport {
        mismatches,
        extra_fields: received.len().saturating_sub(expected.len()),
    }
}

/// Checks that both tables of a codec can carry the handshake.
pub fn check_layout(layout: &[ScalarType]) -> Result<(), ProtocolError> {
    if layout == TEST_LAYOUT {
        Ok(())
    } else {
        Err(ProtocolError::InvalidSchema(format!(
            "`{TEST_MESSAGE}` must have the canonical handshake layout"
        )))
    }
}

fn same_bits(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::F32(x), Value::F32(y)) => x.to_bits() == y.to_bits(),
        (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}
