//! `ExowireServer` builder and accept loop, plus the client-side
//! [`connect`].
//!
//! The server ties the layers together: the WebSocket transport accepts
//! connections, each one becomes a [`Session`] speaking the configured
//! codec, and the caller's `configure` closure registers handlers on it
//! before it is spawned onto its own task.

use std::future::Future;
use std::net::SocketAddr;

use exowire_protocol::{FrameCodec, exosphere};
use exowire_transport::{Transport, TransportError, WebSocketConnection, WebSocketTransport};

use crate::{ExowireError, HandshakeConfig, Session};

/// Builder for configuring and starting an Exowire server.
///
/// # Example
///
/// ```rust,no_run
/// use exowire::prelude::*;
///
/// # async fn example() -> Result<(), ExowireError> {
/// let server = ExowireServer::builder()
///     .bind("0.0.0.0:8080")
///     .handshake(HandshakeConfig::new(1))
///     .build()
///     .await?;
///
/// server
///     .run(|session| {
///         session.on("Connect", |values| {
///             println!("connect: {values:?}");
///             Ok(())
///         })?;
///         Ok(())
///     })
///     .await
/// # }
/// ```
#[derive(Debug)]
pub struct ExowireServerBuilder {
    bind_addr: String,
    codec: Option<FrameCodec>,
    handshake: Option<HandshakeConfig>,
}

impl ExowireServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            codec: None,
            handshake: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the codec every session uses. Defaults to
    /// [`exosphere::server_codec`].
    pub fn codec(mut self, codec: FrameCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Enables the `Test` handshake on every session.
    pub fn handshake(mut self, config: HandshakeConfig) -> Self {
        self.handshake = Some(config);
        self
    }

    /// Binds the transport.
    pub async fn build(self) -> Result<ExowireServer, ExowireError> {
        let codec = match self.codec {
            Some(codec) => codec,
            None => exosphere::server_codec()?,
        };
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        Ok(ExowireServer {
            transport,
            codec,
            handshake: self.handshake,
        })
    }
}

impl Default for ExowireServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Exowire server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ExowireServer {
    transport: WebSocketTransport,
    codec: FrameCodec,
    handshake: Option<HandshakeConfig>,
}

impl ExowireServer {
    /// Creates a new builder.
    pub fn builder() -> ExowireServerBuilder {
        ExowireServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ExowireError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// `configure` is called once per accepted connection to register
    /// handlers and callbacks. If it fails, that connection is dropped and
    /// the server keeps accepting.
    pub async fn run<F>(self, configure: F) -> Result<(), ExowireError>
    where
        F: FnMut(&mut Session<WebSocketConnection>) -> Result<(), ExowireError>,
    {
        self.run_until(configure, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops accepting once `shutdown`
    /// completes. Sessions already running are left to finish.
    pub async fn run_until<F, S>(
        mut self,
        mut configure: F,
        shutdown: S,
    ) -> Result<(), ExowireError>
    where
        F: FnMut(&mut Session<WebSocketConnection>) -> Result<(), ExowireError>,
        S: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Exowire server running");
        tokio::pin!(shutdown);

        loop {
            let conn = tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let mut session = Session::new(conn, self.codec.clone());
            if let Some(config) = self.handshake {
                session.handshake(config);
            }
            if let Err(e) = configure(&mut session) {
                tracing::warn!(conn_id = %session.id(), error = %e, "session setup failed");
                continue;
            }

            tokio::spawn(async move {
                if let Err(e) = session.run().await {
                    tracing::debug!(error = %e, "session ended with error");
                }
            });
        }

        self.transport.shutdown().await?;
        Ok(())
    }
}

/// Dials `url` and wraps the connection in a client [`Session`].
///
/// Register handlers on the returned session, then [`run`](Session::run)
/// it.
pub async fn connect(
    url: &str,
    codec: FrameCodec,
) -> Result<Session<WebSocketConnection>, ExowireError> {
    let conn = WebSocketConnection::connect(url).await?;
    Ok(Session::new(conn, codec))
}
