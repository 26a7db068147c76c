//! Transport layer abstraction
//!
//! A transport owns the listening socket. Accepting yields the peer address
//! and a handshake future that produces the byte stream the endpoint speaks
//! over: the TCP stream itself for plain HTTP, the stream after the TLS
//! handshake for HTTPS. The future is `'static` and is driven on the
//! connection's own task, so the accept loop never waits on a slow client and
//! the listener can be dropped while handshakes are still in flight.

use crate::error::Result;
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream a connection is served over
pub trait TransportStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> TransportStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Transport trait for abstracting different transport types
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The stream type produced by this transport
    type Stream: TransportStream;

    /// Connection setup still to run after accept
    type Handshake: Future<Output = Result<Self::Stream>> + Send + 'static;

    /// Accept an incoming connection
    async fn accept(&self) -> Result<(Self::Handshake, SocketAddr)>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;
}
