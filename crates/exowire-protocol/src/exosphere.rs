//! The Exosphere message tables and their typed forms.
//!
//! Two independent tables, one per direction. Tag values overlap (`Test`
//! is tag 0 both ways) but otherwise mean different things.
//!
//! ```text
//! server → client                    client → server
//! 0 Test         (handshake layout)  0 Test     (handshake layout)
//! 1 GameState    (u8,u16,u16)        1 Connect  (String,String)
//! 2 Metadata     (u64,f32,f32)
//! 3 ObjectCreate (f32,f32,f32,u64,u32,u16)
//! 4 ObjectMove   (u32,f32,f32,f32)
//! ```

use crate::handshake::{self, TEST_LAYOUT, TEST_MESSAGE};
use crate::ScalarType::{self, F32, U16, U32, U64, U8};
use crate::{
    Fields, Frame, FrameCodec, Inbound, MessageSpec, Outbound, ProtocolError,
    Schema, Value,
};

/// Messages the server sends, in tag order.
pub const SERVER_MESSAGES: &[MessageSpec] = &[
    MessageSpec::new(TEST_MESSAGE, TEST_LAYOUT),
    MessageSpec::new("GameState", &[U8, U16, U16]),
    MessageSpec::new("Metadata", &[U64, F32, F32]),
    MessageSpec::new("ObjectCreate", &[F32, F32, F32, U64, U32, U16]),
    MessageSpec::new("ObjectMove", &[U32, F32, F32, F32]),
];

/// Messages the client sends, in tag order.
pub const CLIENT_MESSAGES: &[MessageSpec] = &[
    MessageSpec::new(TEST_MESSAGE, TEST_LAYOUT),
    MessageSpec::new("Connect", &[ScalarType::String, ScalarType::String]),
];

/// The codec a client uses: decodes server messages, encodes client ones.
pub fn client_codec() -> Result<FrameCodec, ProtocolError> {
    Ok(FrameCodec::new(
        Schema::from_static(SERVER_MESSAGES)?,
        Schema::from_static(CLIENT_MESSAGES)?,
    ))
}

/// The codec a server uses: the client codec reversed.
pub fn server_codec() -> Result<FrameCodec, ProtocolError> {
    Ok(client_codec()?.reversed())
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// A message sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Handshake vector; see [`crate::handshake`].
    Test(Vec<Value>),
    /// Clock and phase update.
    GameState {
        flags: u8,
        tick: u16,
        stage_length: u16,
    },
    /// Sent once the client may begin playing.
    Metadata {
        id: u64,
        board_width: f32,
        board_height: f32,
    },
    ObjectCreate {
        x: f32,
        y: f32,
        angle: f32,
        owner: u64,
        id: u32,
        kind: u16,
    },
    ObjectMove {
        id: u32,
        x: f32,
        y: f32,
        angle: f32,
    },
}

/// Bits of the `GameState` flags byte.
pub mod game_flags {
    pub const IO: u8 = 0b1000_0000;
    pub const PLAYING: u8 = 0b0100_0000;
    pub const STRATEGY: u8 = 0b0010_0000;
}

impl Inbound for ServerMessage {
    const NAMES: &'static [&'static str] =
        &[TEST_MESSAGE, "GameState", "Metadata", "ObjectCreate", "ObjectMove"];

    fn from_parts(name: &str, values: Vec<Value>) -> Result<Self, ProtocolError> {
        if name == TEST_MESSAGE {
            return test_from_values(values).map(Self::Test);
        }

        let mut f = Fields::new(name, values);
        let msg = match name {
            "GameState" => Self::GameState {
                flags: f.next()?,
                tick: f.next()?,
                stage_length: f.next()?,
            },
            "Metadata" => Self::Metadata {
                id: f.next()?,
                board_width: f.next()?,
                board_height: f.next()?,
            },
            "ObjectCreate" => Self::ObjectCreate {
                x: f.next()?,
                y: f.next()?,
                angle: f.next()?,
                owner: f.next()?,
                id: f.next()?,
                kind: f.next()?,
            },
            "ObjectMove" => Self::ObjectMove {
                id: f.next()?,
                x: f.next()?,
                y: f.next()?,
                angle: f.next()?,
            },
            other => return Err(ProtocolError::UnknownMessage(other.to_string())),
        };
        f.finish()?;
        Ok(msg)
    }
}

impl Outbound for ServerMessage {
    fn into_frame(self) -> Frame {
        match self {
            Self::Test(values) => Frame::new(TEST_MESSAGE, values),
            Self::GameState {
                flags,
                tick,
                stage_length,
            } => Frame::new("GameState", vec![flags.into(), tick.into(), stage_length.into()]),
            Self::Metadata {
                id,
                board_width,
                board_height,
            } => Frame::new(
                "Metadata",
                vec![id.into(), board_width.into(), board_height.into()],
            ),
            Self::ObjectCreate {
                x,
                y,
                angle,
                owner,
                id,
                kind,
            } => Frame::new(
                "ObjectCreate",
                vec![
                    x.into(),
                    y.into(),
                    angle.into(),
                    owner.into(),
                    id.into(),
                    kind.into(),
                ],
            ),
            Self::ObjectMove { id, x, y, angle } => Frame::new(
                "ObjectMove",
                vec![id.into(), x.into(), y.into(), angle.into()],
            ),
        }
    }
}

impl ServerMessage {
    /// `true` for a `GameState` with the given flag bit set.
    pub fn has_flag(&self, bit: u8) -> bool {
        matches!(self, Self::GameState { flags, .. } if flags & bit != 0)
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A message sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Test(Vec<Value>),
    /// Join the game. An empty password means none.
    Connect { nickname: String, password: String },
}

impl Inbound for ClientMessage {
    const NAMES: &'static [&'static str] = &[TEST_MESSAGE, "Connect"];

    fn from_parts(name: &str, values: Vec<Value>) -> Result<Self, ProtocolError> {
        match name {
            TEST_MESSAGE => test_from_values(values).map(Self::Test),
            "Connect" => {
                let mut f = Fields::new(name, values);
                let msg = Self::Connect {
                    nickname: f.next()?,
                    password: f.next()?,
                };
                f.finish()?;
                Ok(msg)
            }
            other => Err(ProtocolError::UnknownMessage(other.to_string())),
        }
    }
}

impl Outbound for ClientMessage {
    fn into_frame(self) -> Frame {
        match self {
            Self::Test(values) => Frame::new(TEST_MESSAGE, values),
            Self::Connect { nickname, password } => {
                Frame::new("Connect", vec![nickname.into(), password.into()])
            }
        }
    }
}

fn test_from_values(values: Vec<Value>) -> Result<Vec<Value>, ProtocolError> {
    if values.len() != TEST_LAYOUT.len() {
        return Err(ProtocolError::ArityMismatch {
            message: TEST_MESSAGE.to_string(),
            expected: TEST_LAYOUT.len(),
            actual: values.len(),
        });
    }
    let types: Vec<_> = values.iter().map(Value::scalar_type).collect();
    handshake::check_layout(&types)?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::canonical_values;

    fn through_wire<M: Outbound + Inbound>(msg: M, codec: &FrameCodec) -> M {
        let frame = msg.into_frame();
        let bytes = codec.encode_frame(&frame).unwrap();
        M::from_frame(codec.reversed().decode(&bytes).unwrap()).unwrap()
    }

    #[test]
    fn test_tables_are_valid() {
        let codec = client_codec().unwrap();
        assert_eq!(codec.inbound().len(), 5);
        assert_eq!(codec.outbound().len(), 2);
    }

    #[test]
    fn test_server_codec_is_client_reversed() {
        let server = server_codec().unwrap();
        assert_eq!(server.inbound().tag_of("Connect").unwrap(), 1);
        assert_eq!(server.outbound().tag_of("ObjectMove").unwrap(), 4);
    }

    #[test]
    fn test_tags_follow_table_order() {
        let codec = client_codec().unwrap();
        let names: Vec<&str> = codec.inbound().names().collect();
        assert_eq!(names, ServerMessage::NAMES);
        let names: Vec<&str> = codec.outbound().names().collect();
        assert_eq!(names, ClientMessage::NAMES);
    }

    #[test]
    fn test_server_messages_cross_the_wire() {
        let server = server_codec().unwrap();
        for msg in [
            ServerMessage::Test(canonical_values(0)),
            ServerMessage::GameState {
                flags: game_flags::PLAYING,
                tick: 120,
                stage_length: 600,
            },
            ServerMessage::Metadata {
                id: u64::MAX,
                board_width: 5000.0,
                board_height: 5000.0,
            },
            ServerMessage::ObjectCreate {
                x: 10.5,
                y: -3.25,
                angle: std::f32::consts::PI,
                owner: 1 << 60,
                id: 42,
                kind: 1,
            },
            ServerMessage::ObjectMove {
                id: 42,
                x: 11.0,
                y: -3.0,
                angle: 0.0,
            },
        ] {
            assert_eq!(through_wire(msg.clone(), &server), msg);
        }
    }

    #[test]
    fn test_client_messages_cross_the_wire() {
        let client = client_codec().unwrap();
        let connect = ClientMessage::Connect {
            nickname: "ナビゲーター".into(),
            password: String::new(),
        };
        assert_eq!(through_wire(connect.clone(), &client), connect);

        let test = ClientMessage::Test(canonical_values(0));
        assert_eq!(through_wire(test.clone(), &client), test);
    }

    #[test]
    fn test_test_message_layout_is_checked() {
        let mut values = canonical_values(0);
        values[1] = Value::U16(128);
        assert!(matches!(
            ClientMessage::from_parts(TEST_MESSAGE, values),
            Err(ProtocolError::InvalidSchema(_))
        ));
        assert!(matches!(
            ServerMessage::from_parts(TEST_MESSAGE, vec![Value::U8(0)]),
            Err(ProtocolError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert!(matches!(
            ServerMessage::from_parts("Connect", vec![]),
            Err(ProtocolError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_game_state_flags() {
        let msg = ServerMessage::GameState {
            flags: game_flags::IO | game_flags::STRATEGY,
            tick: 0,
            stage_length: 0,
        };
        assert!(msg.has_flag(game_flags::IO));
        assert!(msg.has_flag(game_flags::STRATEGY));
        assert!(!msg.has_flag(game_flags::PLAYING));
    }
}
