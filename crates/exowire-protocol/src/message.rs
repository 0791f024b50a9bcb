//! Typed messages on top of dynamic frames.
//!
//! A [`Frame`] is a name plus a `Vec<Value>`: flexible, but every field
//! access is a runtime type check. For a fixed table it is nicer to work
//! with a closed enum where each variant carries its fields with their
//! real Rust types:
//!
//! ```text
//! Frame { name: "ObjectMove", values: [U32(7), F32(1.0), F32(2.0), F32(0.5)] }
//!        ⇅  Inbound / Outbound
//! ServerMessage::ObjectMove { id: 7, x: 1.0, y: 2.0, angle: 0.5 }
//! ```
//!
//! [`Inbound`] turns frames into such an enum (used on the receive side),
//! [`Outbound`] turns the enum back into a frame (used on the send side).
//! [`Fields`] does the per-field work for `Inbound` impls.

use crate::{Frame, ProtocolError, Value};

/// A closed set of messages that can be built from decoded frames.
pub trait Inbound: Sized {
    /// Every message name this type understands, in any order.
    const NAMES: &'static [&'static str];

    /// Builds a message from a frame's name and values.
    ///
    /// # Errors
    /// `UnknownMessage` for a name outside [`NAMES`](Self::NAMES),
    /// `ArityMismatch` or `TypeMismatch` if the values don't fit.
    fn from_parts(name: &str, values: Vec<Value>) -> Result<Self, ProtocolError>;

    fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        Self::from_parts(&frame.name, frame.values)
    }
}

/// A message that can be turned into a frame for sending.
pub trait Outbound {
    fn into_frame(self) -> Frame;
}

impl Outbound for Frame {
    fn into_frame(self) -> Frame {
        self
    }
}

/// Pulls typed fields off a frame's values, in order.
///
/// ```rust
/// use exowire_protocol::{Fields, Value};
///
/// let mut fields = Fields::new("Connect", vec![Value::from("ada"), Value::from("")]);
/// let nickname: String = fields.next().unwrap();
/// let password: String = fields.next().unwrap();
/// fields.finish().unwrap();
/// assert_eq!(nickname, "ada");
/// assert!(password.is_empty());
/// ```
#[derive(Debug)]
pub struct Fields {
    message: String,
    expected: usize,
    taken: usize,
    values: std::vec::IntoIter<Value>,
}

impl Fields {
    pub fn new(message: &str, values: Vec<Value>) -> Self {
        Self {
            message: message.to_string(),
            expected: values.len(),
            taken: 0,
            values: values.into_iter(),
        }
    }

    /// Takes the next field as `T`.
    pub fn next<T>(&mut self) -> Result<T, ProtocolError>
    where
        T: TryFrom<Value, Error = ProtocolError>,
    {
        let value = self.values.next().ok_or_else(|| {
            ProtocolError::ArityMismatch {
                message: self.message.clone(),
                expected: self.taken + 1,
                actual: self.expected,
            }
        })?;
        self.taken += 1;
        T::try_from(value)
    }

    /// Fails if fields are left over.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.taken == self.expected {
            Ok(())
        } else {
            Err(ProtocolError::ArityMismatch {
                message: self.message,
                expected: self.taken,
                actual: self.expected,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_in_order() {
        let mut fields = Fields::new(
            "ObjectMove",
            vec![Value::U32(9), Value::F32(1.5), Value::F32(-2.0), Value::F32(0.25)],
        );
        assert_eq!(fields.next::<u32>().unwrap(), 9);
        assert_eq!(fields.next::<f32>().unwrap(), 1.5);
        assert_eq!(fields.next::<f32>().unwrap(), -2.0);
        assert_eq!(fields.next::<f32>().unwrap(), 0.25);
        fields.finish().unwrap();
    }

    #[test]
    fn test_fields_too_few() {
        let mut fields = Fields::new("GameState", vec![Value::U8(1)]);
        fields.next::<u8>().unwrap();
        assert!(matches!(
            fields.next::<u16>(),
            Err(ProtocolError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_fields_too_many() {
        let mut fields = Fields::new("GameState", vec![Value::U8(1), Value::U8(2)]);
        fields.next::<u8>().unwrap();
        assert!(matches!(
            fields.finish(),
            Err(ProtocolError::ArityMismatch { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_fields_wrong_type() {
        let mut fields = Fields::new("Metadata", vec![Value::F32(1.0)]);
        assert!(matches!(
            fields.next::<u64>(),
            Err(ProtocolError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_frame_is_its_own_outbound() {
        let frame = Frame::new("Ping", vec![Value::U8(1)]);
        assert_eq!(frame.clone().into_frame(), frame);
    }
}
