//! Session configuration.

use serde::{Deserialize, Serialize};

/// What a session does when the peer's `Test` vector doesn't match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakePolicy {
    /// Log a warning and keep going.
    #[default]
    Advisory,
    /// Close the session with
    /// [`ExowireError::HandshakeRejected`](crate::ExowireError::HandshakeRejected).
    Strict,
}

/// Handshake settings for a session.
///
/// `version` goes out as the trailing `u8` of our `Test` vector and is
/// what we expect the peer's trailing field to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    pub version: u8,
    pub policy: HandshakePolicy,
}

impl HandshakeConfig {
    pub fn new(version: u8) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Same config, but mismatches close the session.
    pub fn strict(mut self) -> Self {
        self.policy = HandshakePolicy::Strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_advisory_version_zero() {
        let config = HandshakeConfig::default();
        assert_eq!(config.version, 0);
        assert_eq!(config.policy, HandshakePolicy::Advisory);
    }

    #[test]
    fn test_strict_keeps_version() {
        let config = HandshakeConfig::new(4).strict();
        assert_eq!(config.version, 4);
        assert_eq!(config.policy, HandshakePolicy::Strict);
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let config: HandshakeConfig = serde_json::from_str(r#"{"policy":"Strict"}"#).unwrap();
        assert_eq!(config, HandshakeConfig::new(0).strict());

        let config: HandshakeConfig = serde_json::from_str(r#"{"version":2}"#).unwrap();
        assert_eq!(config, HandshakeConfig::new(2));
    }
}
