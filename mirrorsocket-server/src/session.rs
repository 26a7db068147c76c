//! WebSocket echo sessions
//!
//! Every upgraded connection runs on its own task and sends each text or
//! binary message straight back, in arrival order. The [`SessionManager`]
//! tracks those tasks so a stopping server can close them and wait for them.

use crate::logging::{EventSink, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use mirrorsocket_core::error::{Error, LifecycleError};
use mirrorsocket_core::{Result, TransportStream};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

/// How long a closing session waits for the peer's close reply
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Tracks live echo sessions
#[derive(Debug)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_id: AtomicU64,
    closing: watch::Sender<bool>,
    sink: Arc<dyn EventSink>,
}

impl SessionManager {
    /// Create a manager with no sessions
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            closing,
            sink,
        }
    }

    /// Take over a connection whose upgrade response has been sent.
    ///
    /// `leftover` holds bytes already read past the request head; they are
    /// the start of the WebSocket byte stream. Once [`close_all`] has begun
    /// the connection only gets a close frame, so every session that runs is
    /// one `close_all` waits for.
    ///
    /// [`close_all`]: SessionManager::close_all
    pub async fn open<S: TransportStream>(&self, stream: S, leftover: Vec<u8>) {
        let mut ws = WebSocketStream::from_partially_read(stream, leftover, Role::Server, None).await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let closing = self.closing.subscribe();
        let sink = self.sink.clone();
        let registry = self.sessions.clone();

        // Registration happens under the lock so a session that finishes
        // immediately still finds its own entry to remove, and so `close_all`
        // either drains this entry or this check sees `closing`.
        let mut sessions = self.sessions.lock().await;
        if *self.closing.borrow() {
            drop(sessions);
            let _ = ws.close(None).await;
            return;
        }
        let handle = tokio::spawn(async move {
            echo(ws, closing, sink.as_ref()).await;
            registry.lock().await.remove(&id);
        });
        sessions.insert(id, handle);
    }

    /// Number of sessions still running
    pub async fn active(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Ask every session to close, without waiting
    pub fn signal_close(&self) {
        self.closing.send_replace(true);
    }

    /// Close every session and wait until all of them have finished
    pub async fn close_all(&self) -> Result<()> {
        self.signal_close();

        let handles: Vec<_> = self
            .sessions
            .lock()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        let mut failure = None;
        for handle in handles {
            if let Err(e) = handle.await {
                failure.get_or_insert_with(|| e.to_string());
            }
        }

        match failure {
            Some(e) => Err(Error::Lifecycle(LifecycleError::Join(e))),
            None => Ok(()),
        }
    }
}

/// Printable form of a data message
fn render(message: &Message) -> String {
    match message {
        Message::Text(text) => text.clone(),
        Message::Binary(data) => String::from_utf8_lossy(data).into_owned(),
        other => other.to_string(),
    }
}

async fn echo<S: TransportStream>(
    mut ws: WebSocketStream<S>,
    mut closing: watch::Receiver<bool>,
    sink: &dyn EventSink,
) {
    sink.emit(ServerEvent::ConnectionOpened);

    loop {
        let close_requested = *closing.borrow_and_update();
        if close_requested {
            close_gracefully(&mut ws).await;
            break;
        }

        tokio::select! {
            _ = closing.changed() => {
                close_gracefully(&mut ws).await;
                break;
            }
            incoming = ws.next() => match incoming {
                Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                    let shown = render(&message);
                    sink.emit(ServerEvent::MessageReceived(shown.clone()));
                    if let Err(e) = ws.send(message).await {
                        sink.emit(ServerEvent::SessionError(e.to_string()));
                        break;
                    }
                    sink.emit(ServerEvent::MessageEchoed(shown));
                }
                // Ping, pong and close are answered inside tungstenite.
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => break,
                Some(Err(e)) => {
                    sink.emit(ServerEvent::SessionError(e.to_string()));
                    break;
                }
            }
        }
    }

    sink.emit(ServerEvent::ConnectionClosed);
}

async fn close_gracefully<S: TransportStream>(ws: &mut WebSocketStream<S>) {
    if ws.close(None).await.is_err() {
        return;
    }
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
}
