//! The frame codec: schema entry + values ⇄ bytes.
//!
//! ```text
//! ┌─────┬─────────┬─────────┬─────┬─────────┐
//! │ tag │ field 1 │ field 2 │ ... │ field n │
//! └─────┴─────────┴─────────┴─────┴─────────┘
//!   u8    layout[0] layout[1]       layout[n-1]
//! ```
//!
//! There is no length prefix: one transport message carries exactly one
//! frame, so the frame ends where the transport message ends.

use std::fmt;
use std::sync::Arc;

use crate::scalar::Reader;
use crate::{ProtocolError, Schema, Value};

/// A decoded frame: the message name and its field values in schema order.
///
/// This is the unit both produced by decoding and consumed by encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub values: Vec<Value>,
}

impl Frame {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl Schema {
    /// Decodes one frame against this table.
    ///
    /// # Errors
    /// - `TruncatedFrame` if the buffer is empty or ends inside a field.
    /// - `UnknownTag` if the first byte names no definition.
    /// - `InvalidUtf8` for a malformed string field.
    /// - `TrailingBytes` if bytes remain after the last field.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, ProtocolError> {
        let mut reader = Reader::new(bytes);
        let [tag] = reader.array::<1>()?;
        let def = self.get(tag)?;

        let values = def
            .layout
            .iter()
            .map(|ty| ty.decode(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        if reader.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes {
                message: def.name.clone(),
                extra: reader.remaining(),
            });
        }

        Ok(Frame {
            name: def.name.clone(),
            values,
        })
    }

    /// Encodes `values` as the message called `name`.
    ///
    /// The total size is computed first and the buffer allocated once.
    /// Nothing is returned unless every field encoded.
    ///
    /// # Errors
    /// - `UnknownMessage` if `name` is not in this table.
    /// - `ArityMismatch` if `values.len()` differs from the layout.
    /// - `TypeMismatch` if a value does not match its field's type.
    /// - `SizeLimitExceeded` for a string over 65 535 bytes.
    pub fn encode(
        &self,
        name: &str,
        values: &[Value],
    ) -> Result<Vec<u8>, ProtocolError> {
        let (tag, def) = self.lookup(name)?;

        if values.len() != def.arity() {
            return Err(ProtocolError::ArityMismatch {
                message: def.name.clone(),
                expected: def.arity(),
                actual: values.len(),
            });
        }

        let mut size = 1;
        for (ty, value) in def.layout.iter().zip(values) {
            size += ty.size(value)?;
        }

        let mut buf = Vec::with_capacity(size);
        buf.push(tag);
        for (ty, value) in def.layout.iter().zip(values) {
            ty.encode(value, &mut buf)?;
        }
        debug_assert_eq!(buf.len(), size);

        Ok(buf)
    }

    /// Encodes a [`Frame`].
    pub fn encode_frame(&self, frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
        self.encode(&frame.name, &frame.values)
    }
}

/// Both tables of one endpoint, kept apart.
///
/// `decode` only ever consults the inbound table and `encode` only the
/// outbound one. Decoding a frame against the wrong direction's table
/// either fails with `UnknownTag` or, worse, succeeds with the wrong
/// shape when the sizes happen to line up.
///
/// Cloning is cheap: the tables sit behind `Arc`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    inbound: Arc<Schema>,
    outbound: Arc<Schema>,
}

impl FrameCodec {
    pub fn new(inbound: Schema, outbound: Schema) -> Self {
        Self {
            inbound: Arc::new(inbound),
            outbound: Arc::new(outbound),
        }
    }

    /// Builds a codec from tables already shared elsewhere.
    pub fn from_shared(inbound: Arc<Schema>, outbound: Arc<Schema>) -> Self {
        Self { inbound, outbound }
    }

    /// The peer's view of the same connection: inbound and outbound swap.
    pub fn reversed(&self) -> Self {
        Self {
            inbound: Arc::clone(&self.outbound),
            outbound: Arc::clone(&self.inbound),
        }
    }

    pub fn inbound(&self) -> &Arc<Schema> {
        &self.inbound
    }

    pub fn outbound(&self) -> &Arc<Schema> {
        &self.outbound
    }

    /// Decodes an inbound frame.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, ProtocolError> {
        self.inbound.decode(bytes)
    }

    /// Encodes an outbound message.
    pub fn encode(
        &self,
        name: &str,
        values: &[Value],
    ) -> Result<Vec<u8>, ProtocolError> {
        self.outbound.encode(name, values)
    }

    pub fn encode_frame(&self, frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
        self.outbound.encode_frame(frame)
    }
}
