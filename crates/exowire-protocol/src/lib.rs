//! Wire protocol for Exowire.
//!
//! This crate defines the "language" that a game client and server speak:
//!
//! - **Scalars** ([`ScalarType`], [`Value`], [`Scalar`]): the eleven
//!   primitive wire types and how each is encoded.
//! - **Schemas** ([`Schema`], [`MessageDef`], [`MessageSpec`]): ordered
//!   tables of named messages, one table per direction. A message's
//!   position in its table is its wire tag.
//! - **Frames** ([`Frame`], [`FrameCodec`]): a tag byte followed by the
//!   message's fields, and the codec that turns frames into bytes and back.
//! - **Dispatch** ([`Router`], [`Inbound`], [`Outbound`]): routing decoded
//!   frames to handlers, either by name or through a typed enum.
//! - **Handshake** ([`handshake`]): the canonical `Test` vector both peers
//!   exchange to confirm they agree on the codec and tables.
//! - **Errors** ([`ProtocolError`]): what can go wrong along the way.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and application
//! logic (typed messages). It doesn't know about sockets or sessions;
//! it only knows how to frame, unframe, and route messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame) → Router → application handler
//! ```
//!
//! # Example
//!
//! ```rust
//! use exowire_protocol::exosphere;
//! use exowire_protocol::{Frame, Value};
//!
//! let client = exosphere::client_codec().unwrap();
//! let server = exosphere::server_codec().unwrap();
//!
//! let bytes = client
//!     .encode("Connect", &[Value::from("ada"), Value::from("")])
//!     .unwrap();
//! assert_eq!(bytes[0], 1); // Connect is tag 1 client → server
//!
//! let frame = server.decode(&bytes).unwrap();
//! assert_eq!(frame, Frame::new("Connect", vec!["ada".into(), "".into()]));
//! ```

mod dispatch;
mod error;
mod frame;
mod message;
mod scalar;
mod schema;

pub mod exosphere;
pub mod handshake;

pub use dispatch::{Handler, HandlerResult, Router};
pub use error::{BoxError, ProtocolError};
pub use frame::{Frame, FrameCodec};
pub use message::{Fields, Inbound, Outbound};
pub use scalar::{MAX_STRING_LEN, Reader, Scalar, ScalarType, Value};
pub use schema::{MAX_MESSAGES, MessageDef, MessageSpec, Schema};
