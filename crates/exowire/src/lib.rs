//! # Exowire
//!
//! Typed binary message sessions for the Exosphere game.
//!
//! Exowire speaks a compact, table-driven wire format: each frame is a tag
//! byte (the message's position in the sender's table) followed by its
//! fields in little-endian. This crate bundles the pieces:
//!
//! - [`exowire_protocol`]: scalars, schemas, the frame codec, dispatch
//! - [`exowire_transport`]: WebSocket and in-memory connections
//! - [`Session`]: one connection with its handlers and outbound queue
//! - [`ExowireServer`] / [`connect`]: the server accept loop and the
//!   client entry point
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exowire::prelude::*;
//!
//! # async fn example() -> Result<(), ExowireError> {
//! let mut session = exowire::connect(
//!     "ws://127.0.0.1:8080",
//!     exosphere::client_codec()?,
//! )
//! .await?;
//!
//! session.on_message::<ServerMessage, _>(|msg| {
//!     println!("{msg:?}");
//!     Ok(())
//! })?;
//! session.on_open(|sender| {
//!     let _ = sender.send_message(ClientMessage::Connect {
//!         nickname: "ada".into(),
//!         password: String::new(),
//!     });
//! });
//! session.run().await
//! # }
//! ```

mod config;
mod error;
mod server;
mod session;

pub use config::{HandshakeConfig, HandshakePolicy};
pub use error::ExowireError;
pub use server::{ExowireServer, ExowireServerBuilder, connect};
pub use session::{NamedSender, Sender, Session, SessionState};

pub use exowire_protocol;
pub use exowire_transport;

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::{
        ExowireError, ExowireServer, HandshakeConfig, HandshakePolicy, NamedSender, Sender,
        Session, SessionState, connect,
    };
    pub use exowire_protocol::exosphere::{self, ClientMessage, ServerMessage};
    pub use exowire_protocol::{
        Frame, FrameCodec, HandlerResult, Inbound, Outbound, ProtocolError, Schema, Value,
    };
    pub use exowire_transport::{
        Connection, MemoryConnection, TransportError, WebSocketConnection,
    };
}
