/// Errors from binding, dialing, or moving bytes over a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The other side (or our own `close`) ended the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The write half failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The read half failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or upgrading an accepted socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Dialing a remote peer failed.
    #[error("connect to {url} failed: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// `accept` after `shutdown`.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// `true` when the error means the peer is gone rather than that
    /// something broke.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_) | Self::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_names_url() {
        let err = TransportError::ConnectFailed {
            url: "ws://127.0.0.1:1".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(err.to_string(), "connect to ws://127.0.0.1:1 failed: refused");
    }

    #[test]
    fn test_is_closed() {
        assert!(TransportError::ConnectionClosed("peer".into()).is_closed());
        assert!(TransportError::Shutdown.is_closed());
        let io = std::io::Error::other("boom");
        assert!(!TransportError::SendFailed(io).is_closed());
    }
}
