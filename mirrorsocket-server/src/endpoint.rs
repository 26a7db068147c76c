//! Per-connection request handling
//!
//! One [`Endpoint::serve_connection`] call owns one accepted connection. It
//! reads request heads in a keep-alive loop, answers GETs from the resource
//! cache, rejects everything else, and hands upgraded connections to the
//! [`SessionManager`].

use crate::cache::ResourceCache;
use crate::logging::{EventSink, ServerEvent};
use crate::resolver;
use crate::session::SessionManager;
use bytes::{Buf, BytesMut};
use mirrorsocket_core::error::{Error, ProtocolError};
use mirrorsocket_core::handshake;
use mirrorsocket_core::http::{parse_request_head, RequestBody, RequestHead, Response};
use mirrorsocket_core::protocol::{http_header, http_method, http_value};
use mirrorsocket_core::{Result, TransportStream};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;

/// Shared state every connection task needs
#[derive(Debug, Clone)]
pub struct Endpoint {
    cache: Arc<ResourceCache>,
    sessions: Arc<SessionManager>,
    sink: Arc<dyn EventSink>,
    shutdown: watch::Receiver<bool>,
}

impl Endpoint {
    /// Create an endpoint; connections stop reading new requests once
    /// `shutdown` turns `true` or its sender is dropped.
    pub fn new(
        cache: Arc<ResourceCache>,
        sessions: Arc<SessionManager>,
        sink: Arc<dyn EventSink>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cache,
            sessions,
            sink,
            shutdown,
        }
    }

    /// Where this endpoint reports events
    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    /// Serve requests on one connection until it is closed or upgraded
    pub async fn serve_connection<S: TransportStream>(&self, mut stream: S) -> Result<()> {
        let mut shutdown = self.shutdown.clone();
        let mut buf = BytesMut::with_capacity(1024);

        loop {
            let head = match read_head(&mut stream, &mut buf, &mut shutdown).await {
                Ok(Some(head)) => head,
                Ok(None) => return Ok(()),
                Err(Error::Protocol(ProtocolError::HeadTooLarge { .. })) => {
                    return write_response(&mut stream, &Response::head_too_large()).await
                }
                Err(Error::Protocol(ProtocolError::MalformedRequest(_))) => {
                    return write_response(&mut stream, &Response::bad_request()).await
                }
                Err(Error::Protocol(ProtocolError::IncompleteRequest)) => return Ok(()),
                Err(e) => return Err(e),
            };

            if head.method != http_method::GET {
                return write_response(&mut stream, &Response::method_not_allowed()).await;
            }

            if handshake::is_upgrade_request(&head) {
                return match handshake::validate_upgrade(&head) {
                    Ok(key) => {
                        write_response(&mut stream, &handshake::accept_response(&key)).await?;
                        self.sessions.open(stream, buf.to_vec()).await;
                        Ok(())
                    }
                    Err(_) => write_response(&mut stream, &Response::bad_request()).await,
                };
            }

            let body = head.body();
            let keep_alive = head.keep_alive() && body != RequestBody::Unframed;
            let connection = if keep_alive {
                http_value::KEEP_ALIVE
            } else {
                http_value::CLOSE
            };
            let response = self
                .respond(&head)
                .await
                .header(http_header::CONNECTION, connection);
            write_response(&mut stream, &response).await?;

            if !keep_alive {
                return Ok(());
            }
            if let RequestBody::Length(length) = body {
                if !skip_body(&mut stream, &mut buf, length).await? {
                    return Ok(());
                }
            }
        }
    }

    /// Answer a GET for a static resource
    pub async fn respond(&self, head: &RequestHead) -> Response {
        let normalized = resolver::resolve(&resolver::decode_path(&head.path()));
        if !resolver::is_public(&normalized) {
            return Response::not_found();
        }

        match self.cache.get_or_load(&normalized).await {
            Ok(Some(file)) => Response::ok(file.content.clone(), file.content_type),
            Ok(None) => Response::not_found(),
            Err(e) => {
                self.sink.emit(ServerEvent::ResourceError {
                    path: normalized,
                    error: e.to_string(),
                });
                Response::not_found()
            }
        }
    }
}

/// Read until a full request head is buffered.
///
/// `Ok(None)` means the peer closed cleanly between requests or the server
/// is shutting down.
async fn read_head<S: TransportStream>(
    stream: &mut S,
    buf: &mut BytesMut,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Option<RequestHead>> {
    loop {
        if let Some((head, consumed)) = parse_request_head(&buf[..])? {
            buf.advance(consumed);
            return Ok(Some(head));
        }

        let stopping = *shutdown.borrow();
        if stopping {
            return Ok(None);
        }

        tokio::select! {
            _ = shutdown.changed() => return Ok(None),
            read = stream.read_buf(buf) => {
                if read? == 0 {
                    return if buf.is_empty() {
                        Ok(None)
                    } else {
                        Err(ProtocolError::IncompleteRequest.into())
                    };
                }
            }
        }
    }
}

/// Drop `length` body bytes, buffered ones first.
///
/// `Ok(false)` means the peer closed before the body was complete.
async fn skip_body<S: TransportStream>(
    stream: &mut S,
    buf: &mut BytesMut,
    length: u64,
) -> Result<bool> {
    let buffered = buf.len().min(usize::try_from(length).unwrap_or(usize::MAX));
    buf.advance(buffered);

    let remaining = length - buffered as u64;
    if remaining == 0 {
        return Ok(true);
    }
    let skipped = tokio::io::copy(&mut (&mut *stream).take(remaining), &mut tokio::io::sink()).await?;
    Ok(skipped == remaining)
}

async fn write_response<S: TransportStream>(stream: &mut S, response: &Response) -> Result<()> {
    stream.write_all(&response.to_bytes()).await?;
    stream.flush().await?;
    if response.closes_connection() {
        stream.shutdown().await?;
    }
    Ok(())
}
