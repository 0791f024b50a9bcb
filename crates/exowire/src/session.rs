//! Sessions: one connection, its codec, and the handlers for its messages.
//!
//! A [`Session`] is the connection/dispatch layer. It owns a transport
//! [`Connection`], decodes every inbound transport message as exactly one
//! frame, and routes it to the handler registered for that message name.
//! Outbound traffic goes through a [`Sender`], which encodes on the
//! caller's thread and queues the bytes for the session task.
//!
//! ```text
//!                  ┌──────────── Session task ────────────┐
//! conn.recv() ───▶ │ decode → Router → handler(&[Value])  │
//!                  │                                      │
//! Sender::send ──▶ │ queue ─────────────────▶ conn.send() │
//!   (encodes)      └──────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──run()──▶ Open ──peer close / error / Sender::close──▶ Closed
//! ```
//!
//! Handlers and callbacks are registered while the session is
//! `Connecting`. [`run`](Session::run) consumes the session, so nothing
//! can be registered once frames start flowing. `on_open` runs on entering
//! `Open`; `on_close` runs exactly once on entering `Closed`.
//!
//! # Errors while running
//!
//! A frame that cannot be decoded means the byte stream is out of step
//! with the tables, so the session closes and `run` returns the error.
//! A frame with no handler, or a handler that fails, is passed to
//! `on_error` (or logged) and the session carries on.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use exowire_protocol::handshake::{self, HandshakeReport, TEST_MESSAGE};
use exowire_protocol::{
    Frame, FrameCodec, HandlerResult, Inbound, Outbound, ProtocolError, Router, Schema, Value,
};
use exowire_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::mpsc;

use crate::{ExowireError, HandshakeConfig, HandshakePolicy};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, handlers being registered, not yet running.
    Connecting,
    /// Running: frames are dispatched and the outbound queue is drained.
    Open,
    /// Finished. `on_close` has run.
    Closed,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// State cell shared by a session and its senders.
#[derive(Debug, Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::Connecting as u8)))
    }

    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

enum Outgoing {
    Frame(Vec<u8>),
    Close,
}

/// Encodes outbound messages and queues them for a session.
///
/// Cheap to clone; every clone feeds the same session. Sending is
/// fire-and-forget: `Ok` means the frame was encoded and queued, not that
/// the peer received it.
#[derive(Clone)]
pub struct Sender {
    conn_id: ConnectionId,
    schema: Arc<Schema>,
    queue: mpsc::UnboundedSender<Outgoing>,
    state: StateCell,
}

impl Sender {
    /// Encodes `name(values…)` with the outbound schema and queues it.
    ///
    /// # Errors
    /// Any encode error (`UnknownMessage`, `ArityMismatch`, `TypeMismatch`,
    /// `SizeLimitExceeded`), or `ConnectionClosed` once the session has
    /// ended.
    pub fn send(&self, name: &str, values: &[Value]) -> Result<(), ExowireError> {
        let bytes = self.schema.encode(name, values)?;
        tracing::debug!(conn_id = %self.conn_id, message = name, len = bytes.len(), "frame queued");
        self.push(Outgoing::Frame(bytes))
    }

    /// Sends a typed message.
    pub fn send_message(&self, msg: impl Outbound) -> Result<(), ExowireError> {
        let frame: Frame = msg.into_frame();
        self.send(&frame.name, &frame.values)
    }

    /// A sender bound to one message definition.
    ///
    /// # Errors
    /// `UnknownMessage` if `name` is not in the outbound schema.
    pub fn named(&self, name: &str) -> Result<NamedSender, ExowireError> {
        self.schema.tag_of(name)?;
        Ok(NamedSender {
            sender: self.clone(),
            name: name.to_string(),
        })
    }

    /// Asks the session to close once the frames queued so far are sent.
    pub fn close(&self) -> Result<(), ExowireError> {
        self.push(Outgoing::Close)
    }

    /// `true` once the session has ended.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// The state of the session this sender feeds. Unlike
    /// [`Session::state`], this stays readable after `run` has taken the
    /// session.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    fn push(&self, outgoing: Outgoing) -> Result<(), ExowireError> {
        self.queue.send(outgoing).map_err(|_| {
            ExowireError::from(TransportError::ConnectionClosed(format!(
                "session {} has ended",
                self.conn_id
            )))
        })
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("conn_id", &self.conn_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// A [`Sender`] fixed to one message, from [`Sender::named`].
#[derive(Debug, Clone)]
pub struct NamedSender {
    sender: Sender,
    name: String,
}

impl NamedSender {
    pub fn send(&self, values: &[Value]) -> Result<(), ExowireError> {
        self.sender.send(&self.name, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

type OpenCallback = Box<dyn FnOnce(&Sender) + Send>;
type CloseCallback = Box<dyn FnOnce() + Send>;
type ErrorCallback = Box<dyn FnMut(&ProtocolError) + Send>;
type HandshakeCallback = Box<dyn FnMut(&HandshakeReport) + Send>;

/// One connection speaking one [`FrameCodec`].
pub struct Session<C: Connection> {
    conn: C,
    codec: FrameCodec,
    router: Router,
    state: StateCell,
    sender: Sender,
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
    handshake: Option<HandshakeConfig>,
    /// Inbound tag of `Test`, set while running with a handshake.
    test_tag: Option<u8>,
    on_open: Option<OpenCallback>,
    on_close: Option<CloseCallback>,
    on_error: Option<ErrorCallback>,
    on_handshake: Option<HandshakeCallback>,
}

impl<C> Session<C>
where
    C: Connection<Error = TransportError>,
{
    /// Wraps `conn`. Inbound frames are decoded with `codec.inbound()`,
    /// outbound frames encoded with `codec.outbound()`.
    pub fn new(conn: C, codec: FrameCodec) -> Self {
        let (queue, outgoing) = mpsc::unbounded_channel();
        let state = StateCell::new();
        let sender = Sender {
            conn_id: conn.id(),
            schema: Arc::clone(codec.outbound()),
            queue,
            state: state.clone(),
        };
        let router = Router::new(Arc::clone(codec.inbound()));
        Self {
            conn,
            codec,
            router,
            state,
            sender,
            outgoing,
            handshake: None,
            test_tag: None,
            on_open: None,
            on_close: None,
            on_error: None,
            on_handshake: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Always `Connecting` here, since `run` consumes the session; use
    /// [`Sender::state`] to follow it while running.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// A sender for this session. Capture clones of it in handlers to reply.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Registers a handler for one inbound message. See [`Router::on`].
    pub fn on<F>(&mut self, name: &str, handler: F) -> Result<&mut Self, ProtocolError>
    where
        F: FnMut(&[Value]) -> HandlerResult + Send + 'static,
    {
        self.router.on(name, handler)?;
        Ok(self)
    }

    /// Registers a typed handler for every message `M` names. See
    /// [`Router::on_message`].
    pub fn on_message<M, F>(&mut self, handler: F) -> Result<&mut Self, ProtocolError>
    where
        M: Inbound + 'static,
        F: Fn(M) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.on_message::<M, F>(handler)?;
        Ok(self)
    }

    /// Runs once, when the session opens. The handshake `Test` (if any) is
    /// already queued ahead of anything sent here.
    pub fn on_open(&mut self, callback: impl FnOnce(&Sender) + Send + 'static) -> &mut Self {
        self.on_open = Some(Box::new(callback));
        self
    }

    /// Runs exactly once, when the session closes for any reason.
    pub fn on_close(&mut self, callback: impl FnOnce() + Send + 'static) -> &mut Self {
        self.on_close = Some(Box::new(callback));
        self
    }

    /// Receives `NoHandler` and `HandlerFailed` errors. Without it they are
    /// logged at `warn`.
    pub fn on_error(
        &mut self,
        callback: impl FnMut(&ProtocolError) + Send + 'static,
    ) -> &mut Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Receives the report for every `Test` the peer sends.
    pub fn on_handshake(
        &mut self,
        callback: impl FnMut(&HandshakeReport) + Send + 'static,
    ) -> &mut Self {
        self.on_handshake = Some(Box::new(callback));
        self
    }

    /// Enables the `Test` handshake.
    ///
    /// On open the canonical vector is sent; inbound `Test` frames are
    /// verified instead of being dispatched. Both tables must carry `Test`
    /// with the canonical layout, or `run` fails before opening.
    pub fn handshake(&mut self, config: HandshakeConfig) -> &mut Self {
        self.handshake = Some(config);
        self
    }

    /// Drives the session until the peer closes, a desync or transport
    /// error occurs, a strict handshake fails, or [`Sender::close`] is
    /// called.
    ///
    /// # Errors
    /// Returns the error that ended the session. A clean close by either
    /// side is `Ok(())`.
    pub async fn run(mut self) -> Result<(), ExowireError> {
        let conn_id = self.conn.id();
        let result = self.drive().await;
        self.state.set(SessionState::Closed);

        if let Err(e) = self.conn.close().await {
            tracing::debug!(%conn_id, error = %e, "close after session end failed");
        }
        match &result {
            Ok(()) => tracing::info!(%conn_id, "session closed"),
            Err(e) => tracing::warn!(%conn_id, error = %e, "session closed with error"),
        }

        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
        result
    }

    async fn drive(&mut self) -> Result<(), ExowireError> {
        let conn_id = self.conn.id();
        if self.handshake.is_some() {
            self.test_tag = Some(self.check_handshake_tables()?);
        }
        self.open()?;

        loop {
            tokio::select! {
                incoming = self.conn.recv() => match incoming? {
                    Some(bytes) => self.receive(&bytes)?,
                    None => {
                        tracing::debug!(%conn_id, "peer closed the connection");
                        return Ok(());
                    }
                },
                Some(outgoing) = self.outgoing.recv() => match outgoing {
                    Outgoing::Frame(bytes) => self.conn.send(&bytes).await?,
                    Outgoing::Close => {
                        tracing::debug!(%conn_id, "close requested");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Returns the inbound tag of `Test`.
    fn check_handshake_tables(&self) -> Result<u8, ProtocolError> {
        let (_, def) = self.codec.outbound().lookup(TEST_MESSAGE)?;
        handshake::check_layout(&def.layout)?;
        let (tag, def) = self.codec.inbound().lookup(TEST_MESSAGE)?;
        handshake::check_layout(&def.layout)?;
        Ok(tag)
    }

    fn open(&mut self) -> Result<(), ExowireError> {
        self.state.set(SessionState::Open);
        tracing::info!(conn_id = %self.conn.id(), "session open");

        if let Some(config) = self.handshake {
            self.sender
                .send(TEST_MESSAGE, &handshake::canonical_values(config.version))?;
        }
        if let Some(on_open) = self.on_open.take() {
            on_open(&self.sender);
        }
        Ok(())
    }

    fn receive(&mut self, bytes: &[u8]) -> Result<(), ExowireError> {
        if self.test_tag.is_some() && bytes.first() == self.test_tag.as_ref() {
            let frame = self.codec.decode(bytes)?;
            return self.verify_handshake(&frame);
        }

        match self.router.dispatch_bytes(bytes) {
            Ok(frame) => {
                tracing::debug!(
                    conn_id = %self.conn.id(),
                    message = %frame.name,
                    "frame dispatched"
                );
                Ok(())
            }
            Err(e) if e.is_desync() => Err(e.into()),
            Err(e) => {
                self.report(e);
                Ok(())
            }
        }
    }

    fn verify_handshake(&mut self, frame: &Frame) -> Result<(), ExowireError> {
        let Some(config) = self.handshake else {
            return Ok(());
        };
        let report = handshake::verify(&frame.values, config.version);
        if report.passed() {
            tracing::debug!(conn_id = %self.conn.id(), "handshake passed");
        } else {
            tracing::warn!(
                conn_id = %self.conn.id(),
                peer_version = ?report.peer_version(),
                %report,
                "handshake mismatch"
            );
        }

        if let Some(callback) = self.on_handshake.as_mut() {
            callback(&report);
        }
        if !report.passed() && config.policy == HandshakePolicy::Strict {
            return Err(ExowireError::HandshakeRejected(report));
        }
        Ok(())
    }

    fn report(&mut self, error: ProtocolError) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(&error);
            return;
        }
        let conn_id = self.conn.id();
        match &error {
            ProtocolError::NoHandler(name) => {
                tracing::warn!(%conn_id, message = %name, "no handler registered")
            }
            _ => tracing::warn!(%conn_id, error = %error, "dispatch failed"),
        }
    }
}

impl<C: Connection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("conn_id", &self.conn.id())
            .field("state", &self.state.get())
            .field("router", &self.router)
            .field("handshake", &self.handshake)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exowire_protocol::exosphere::{self, ServerMessage};
    use exowire_transport::MemoryConnection;

    fn server_session() -> (Session<MemoryConnection>, MemoryConnection) {
        let (server, client) = MemoryConnection::pair();
        let codec = exosphere::server_codec().unwrap();
        (Session::new(server, codec), client)
    }

    // =========================================================================
    // Sender
    // =========================================================================

    #[test]
    fn test_send_rejects_unknown_message_synchronously() {
        let (session, _client) = server_session();
        let sender = session.sender();
        let err = sender.send("Connect", &[]).unwrap_err();
        assert!(matches!(
            err,
            ExowireError::Protocol(ProtocolError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_send_rejects_wrong_types() {
        let (session, _client) = server_session();
        let err = session
            .sender()
            .send("GameState", &[Value::U8(0), Value::U8(1), Value::U16(2)])
            .unwrap_err();
        assert!(matches!(
            err,
            ExowireError::Protocol(ProtocolError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_named_sender_validates_name() {
        let (session, _client) = server_session();
        let sender = session.sender();
        assert_eq!(sender.named("ObjectMove").unwrap().name(), "ObjectMove");
        assert!(sender.named("Move").is_err());
    }

    #[test]
    fn test_send_after_session_dropped() {
        let (session, _client) = server_session();
        let sender = session.sender();
        drop(session);
        assert!(sender.is_closed());
        let err = sender
            .send_message(ServerMessage::GameState {
                flags: 0,
                tick: 0,
                stage_length: 0,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ExowireError::Transport(TransportError::ConnectionClosed(_))
        ));
    }

    // =========================================================================
    // Registration
    // =========================================================================

    #[test]
    fn test_new_session_is_connecting() {
        let (session, _client) = server_session();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.sender().conn_id(), session.id());
        assert_eq!(session.sender().state(), SessionState::Connecting);
    }

    #[test]
    fn test_state_cell_round_trips_every_state() {
        let cell = StateCell::new();
        for state in [SessionState::Open, SessionState::Closed, SessionState::Connecting] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_on_validates_against_inbound_schema() {
        let (mut session, _client) = server_session();
        assert!(session.on("Connect", |_| Ok(())).is_ok());
        // GameState is outbound for a server; it can't be received.
        assert!(matches!(
            session.on("GameState", |_| Ok(())),
            Err(ProtocolError::UnknownMessage(_))
        ));
        assert!(session.router().is_registered("Connect"));
    }

    #[test]
    fn test_on_message_rejects_wrong_direction() {
        let (mut session, _client) = server_session();
        let result = session.on_message::<ServerMessage, _>(|_| Ok(()));
        assert!(result.is_err());
    }
}
