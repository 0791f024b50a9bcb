//! Unified error type for Exowire.

use exowire_protocol::ProtocolError;
use exowire_protocol::handshake::HandshakeReport;
use exowire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `exowire` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ExowireError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, dispatch).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer's `Test` vector did not match and the session is strict.
    #[error("{0}")]
    HandshakeRejected(HandshakeReport),
}

impl ExowireError {
    /// `true` if the session ended because the byte stream could no
    /// longer be trusted.
    pub fn is_desync(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_desync())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exowire_protocol::handshake::{canonical_values, verify};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let exowire_err: ExowireError = err.into();
        assert!(matches!(exowire_err, ExowireError::Transport(_)));
        assert!(exowire_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownTag(9);
        let exowire_err: ExowireError = err.into();
        assert!(matches!(exowire_err, ExowireError::Protocol(_)));
        assert!(exowire_err.is_desync());
    }

    #[test]
    fn test_no_handler_is_not_desync() {
        let err: ExowireError = ProtocolError::NoHandler("Connect".into()).into();
        assert!(!err.is_desync());
    }

    #[test]
    fn test_handshake_rejected_shows_report() {
        let report = verify(&canonical_values(3), 1);
        let err = ExowireError::HandshakeRejected(report);
        assert!(err.to_string().starts_with("handshake failed:"));
    }
}
