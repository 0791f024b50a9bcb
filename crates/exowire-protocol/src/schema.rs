//! Message schema tables.
//!
//! A schema table is the ordered list of message definitions for ONE
//! direction of a connection. The position of a definition in the table
//! is its wire tag, the single byte that starts every frame:
//!
//! ```text
//! tag 0  Test      (String, u8, u16, …)
//! tag 1  Connect   (String, String)
//! ```
//!
//! Both peers must hold identical tables. Inserting, removing, or
//! reordering an entry changes tags and breaks the peer unless it is
//! updated in lockstep. Nothing on the wire detects this beyond the
//! `Test` handshake (see [`crate::handshake`]).
//!
//! Tables are validated once, when they are built, and are immutable
//! afterwards. Share them with `Arc<Schema>`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, ScalarType};

/// The most definitions a table can hold: tags are one byte.
pub const MAX_MESSAGES: usize = u8::MAX as usize + 1;

/// A compile-time message definition.
///
/// Lets tables be declared as `const` arrays:
///
/// ```rust
/// use exowire_protocol::{MessageSpec, ScalarType::*, Schema};
///
/// const OUTBOUND: &[MessageSpec] = &[
///     MessageSpec::new("Ping", &[U64]),
///     MessageSpec::new("Say", &[String]),
/// ];
///
/// let schema = Schema::from_static(OUTBOUND).unwrap();
/// assert_eq!(schema.tag_of("Say").unwrap(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MessageSpec {
    pub name: &'static str,
    pub layout: &'static [ScalarType],
}

impl MessageSpec {
    pub const fn new(
        name: &'static str,
        layout: &'static [ScalarType],
    ) -> Self {
        Self { name, layout }
    }
}

/// One named message and its ordered field layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDef {
    /// Unique within its table.
    pub name: String,
    /// Field types in wire order.
    pub layout: Vec<ScalarType>,
}

impl MessageDef {
    pub fn new(name: impl Into<String>, layout: Vec<ScalarType>) -> Self {
        Self {
            name: name.into(),
            layout,
        }
    }

    /// Number of fields.
    pub fn arity(&self) -> usize {
        self.layout.len()
    }

    /// Smallest possible frame for this message, tag byte included.
    pub fn min_frame_len(&self) -> usize {
        1 + self.layout.iter().map(|ty| ty.min_size()).sum::<usize>()
    }
}

impl From<MessageSpec> for MessageDef {
    fn from(spec: MessageSpec) -> Self {
        Self::new(spec.name, spec.layout.to_vec())
    }
}

/// An ordered, validated table of message definitions for one direction.
#[derive(Debug, Clone)]
pub struct Schema {
    defs: Vec<MessageDef>,
    tags: HashMap<String, u8>,
}

impl Schema {
    /// Builds a table, checking it once.
    ///
    /// # Errors
    /// `InvalidSchema` if the table is longer than [`MAX_MESSAGES`], or a
    /// definition has an empty name, an empty layout, or a name used
    /// earlier in the table.
    pub fn new(defs: Vec<MessageDef>) -> Result<Self, ProtocolError> {
        if defs.len() > MAX_MESSAGES {
            return Err(ProtocolError::InvalidSchema(format!(
                "{} definitions, tags only address {MAX_MESSAGES}",
                defs.len()
            )));
        }

        let mut tags = HashMap::with_capacity(defs.len());
        for (tag, def) in defs.iter().enumerate() {
            if def.name.is_empty() {
                return Err(ProtocolError::InvalidSchema(format!(
                    "definition at tag {tag} has no name"
                )));
            }
            if def.layout.is_empty() {
                return Err(ProtocolError::InvalidSchema(format!(
                    "`{}` has an empty layout",
                    def.name
                )));
            }
            // The length check above guarantees `tag` fits in a byte.
            if tags.insert(def.name.clone(), tag as u8).is_some() {
                return Err(ProtocolError::InvalidSchema(format!(
                    "`{}` is defined twice",
                    def.name
                )));
            }
        }

        Ok(Self { defs, tags })
    }

    /// Builds a table from `const` definitions.
    pub fn from_static(specs: &[MessageSpec]) -> Result<Self, ProtocolError> {
        Self::new(specs.iter().copied().map(MessageDef::from).collect())
    }

    /// Builds a table from a JSON descriptor of the form
    /// `[{ "name": "Test", "layout": ["String", "u8"] }, …]`.
    #[cfg(feature = "json")]
    pub fn from_json(data: &[u8]) -> Result<Self, ProtocolError> {
        let defs: Vec<MessageDef> = serde_json::from_slice(data)?;
        Self::new(defs)
    }

    /// Tag of the definition called `name`.
    pub fn tag_of(&self, name: &str) -> Result<u8, ProtocolError> {
        self.tags
            .get(name)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownMessage(name.to_string()))
    }

    /// The definition at `tag`.
    pub fn get(&self, tag: u8) -> Result<&MessageDef, ProtocolError> {
        self.defs
            .get(tag as usize)
            .ok_or(ProtocolError::UnknownTag(tag))
    }

    /// Looks a definition up by name, returning its tag too.
    pub fn lookup(
        &self,
        name: &str,
    ) -> Result<(u8, &MessageDef), ProtocolError> {
        let tag = self.tag_of(name)?;
        Ok((tag, &self.defs[tag as usize]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &MessageDef> {
        self.defs.iter()
    }

    /// Message names in tag order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.iter().map(|def| def.name.as_str())
    }
}
