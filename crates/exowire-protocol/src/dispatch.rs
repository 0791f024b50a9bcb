//! Routing decoded frames to application handlers.
//!
//! Handlers are registered by message name, but the name is resolved to a
//! tag once, at registration. Dispatch then indexes a slot vector by tag:
//!
//! ```text
//! register("ObjectMove", h)  →  tag_of("ObjectMove") = 4  →  slots[4] = h
//! dispatch_bytes([4, …])     →  decode                    →  slots[4](values)
//! ```
//!
//! A frame whose slot is empty raises [`ProtocolError::NoHandler`] and
//! runs nothing. The router is left untouched, so later frames dispatch
//! normally.

use std::sync::Arc;

use crate::error::BoxError;
use crate::{Frame, Inbound, ProtocolError, Schema, Value};

/// Result type for handler functions.
pub type HandlerResult = Result<(), BoxError>;

/// A registered handler. Receives the frame's values positionally, in
/// schema order.
pub type Handler = Box<dyn FnMut(&[Value]) -> HandlerResult + Send>;

/// Tag-indexed handler table for one inbound schema.
pub struct Router {
    schema: Arc<Schema>,
    slots: Vec<Option<Handler>>,
}

impl Router {
    /// Creates an empty router for `schema` (the inbound table).
    pub fn new(schema: Arc<Schema>) -> Self {
        let slots = std::iter::repeat_with(|| None).take(schema.len()).collect();
        Self { schema, slots }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Registers `handler` for the message called `name`, replacing any
    /// earlier handler for it.
    ///
    /// # Errors
    /// `UnknownMessage` if `name` is not in the inbound schema. Catching
    /// this at registration means a typo fails at start-up, not when the
    /// first frame arrives.
    pub fn on<F>(&mut self, name: &str, handler: F) -> Result<&mut Self, ProtocolError>
    where
        F: FnMut(&[Value]) -> HandlerResult + Send + 'static,
    {
        let tag = self.schema.tag_of(name)?;
        if self.slots[tag as usize].replace(Box::new(handler)).is_some() {
            tracing::debug!(message = name, "replaced handler");
        }
        Ok(self)
    }

    /// Registers one typed handler for every message `M` understands.
    ///
    /// Each frame is converted with [`Inbound::from_parts`] before the
    /// handler sees it; a conversion failure is reported as the handler's
    /// error.
    pub fn on_message<M, F>(&mut self, handler: F) -> Result<&mut Self, ProtocolError>
    where
        M: Inbound + 'static,
        F: Fn(M) -> HandlerResult + Send + Sync + 'static,
    {
        // Validate every name before touching any slot.
        for name in M::NAMES {
            self.schema.tag_of(name)?;
        }

        let handler = Arc::new(handler);
        for &name in M::NAMES {
            let handler = Arc::clone(&handler);
            self.on(name, move |values| {
                let msg = M::from_parts(name, values.to_vec())?;
                handler(msg)
            })?;
        }
        Ok(self)
    }

    /// Removes the handler for `name`, if any.
    pub fn remove(&mut self, name: &str) -> Result<bool, ProtocolError> {
        let tag = self.schema.tag_of(name)?;
        Ok(self.slots[tag as usize].take().is_some())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.schema
            .tag_of(name)
            .map(|tag| self.slots[tag as usize].is_some())
            .unwrap_or(false)
    }

    /// Runs the handler registered for `frame.name`.
    ///
    /// # Errors
    /// `UnknownMessage` if the frame's name is not in the schema,
    /// `NoHandler` if nothing is registered, `HandlerFailed` if the
    /// handler returned an error.
    pub fn dispatch(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        let tag = self.schema.tag_of(&frame.name)?;
        self.call(tag, &frame.name, &frame.values)
    }

    /// Decodes one frame and dispatches it. Returns the decoded frame.
    ///
    /// # Errors
    /// Any decode error from [`Schema::decode`], plus the dispatch errors
    /// of [`dispatch`](Self::dispatch).
    pub fn dispatch_bytes(&mut self, bytes: &[u8]) -> Result<Frame, ProtocolError> {
        let frame = self.schema.decode(bytes)?;
        // `decode` succeeded, so the first byte is a valid tag.
        let tag = bytes[0];
        self.call(tag, &frame.name, &frame.values)?;
        Ok(frame)
    }

    fn call(&mut self, tag: u8, name: &str, values: &[Value]) -> Result<(), ProtocolError> {
        let handler = self.slots[tag as usize]
            .as_mut()
            .ok_or_else(|| ProtocolError::NoHandler(name.to_string()))?;
        handler(values).map_err(|source| ProtocolError::HandlerFailed {
            message: name.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<&str> = self
            .schema
            .names()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.is_some())
            .map(|(name, _)| name)
            .collect();
        f.debug_struct("Router")
            .field("registered", &registered)
            .finish()
    }
}
