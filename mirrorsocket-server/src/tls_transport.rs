//! TLS transport implementation
//!
//! This module provides TLS support for HTTPS and WSS connections. The TLS
//! handshake runs inside the returned handshake future, i.e. on the
//! connection task rather than in the accept loop.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use mirrorsocket_core::{Error, Result, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::ServerConfig as RustlsServerConfig;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

/// TLS transport for HTTPS and WSS connections
pub struct TlsTransport {
    /// TCP listener
    listener: TcpListener,
    /// TLS acceptor
    acceptor: TlsAcceptor,
    /// Local address
    local_addr: SocketAddr,
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl TlsTransport {
    /// Bind to the given address with TLS configuration
    pub async fn bind(addr: SocketAddr, tls_config: Arc<RustlsServerConfig>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(tls_config),
            local_addr,
        })
    }
}

#[async_trait]
impl Transport for TlsTransport {
    type Stream = TlsStream<TcpStream>;
    type Handshake = BoxFuture<'static, Result<Self::Stream>>;

    async fn accept(&self) -> Result<(Self::Handshake, SocketAddr)> {
        let (tcp_stream, peer) = self.listener.accept().await?;
        tcp_stream.set_nodelay(true)?;

        let acceptor = self.acceptor.clone();
        let handshake: Self::Handshake = Box::pin(async move {
            acceptor
                .accept(tcp_stream)
                .await
                .map_err(|e| Error::Tls(format!("Failed to accept TLS connection: {}", e)))
        });

        Ok((handshake, peer))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}
