//! Logging utilities for the echo servers
//!
//! Components never call `tracing` directly for operational events. They
//! emit a [`ServerEvent`] into an injected [`EventSink`]; the default
//! [`TracingSink`] forwards to `tracing`, while [`MemorySink`] keeps events
//! around so tests can assert on them.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::Level;

/// Something worth telling the operator about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A listener is accepting connections
    Listening {
        /// Server name
        server: String,
        /// Bound socket address
        address: SocketAddr,
    },
    /// A listener and its sessions are gone
    Stopped {
        /// Server name
        server: String,
    },
    /// A WebSocket session began
    ConnectionOpened,
    /// A WebSocket session ended
    ConnectionClosed,
    /// A message arrived on a session
    MessageReceived(String),
    /// A message was sent back on a session
    MessageEchoed(String),
    /// A session failed
    SessionError(String),
    /// A connection failed before or while serving HTTP
    ConnectionError {
        /// Remote peer
        peer: SocketAddr,
        /// What went wrong
        error: String,
    },
    /// Accepting a connection failed
    AcceptError(String),
    /// Loading a public resource failed with something other than not-found
    ResourceError {
        /// Normalized request path
        path: String,
        /// What went wrong
        error: String,
    },
    /// Existing certificate is being loaded
    ReadingCertificate(PathBuf),
    /// Existing key is being loaded
    ReadingKey(PathBuf),
    /// Existing material could not be read and will be regenerated
    MaterialUnreadable(String),
    /// Self-signed generation started
    GeneratingCertificate,
    /// Generated key is being persisted
    WritingKey(PathBuf),
    /// Generated certificate is being persisted
    WritingCertificate(PathBuf),
}

impl ServerEvent {
    /// Severity the event is logged at
    pub fn level(&self) -> Level {
        match self {
            ServerEvent::SessionError(_)
            | ServerEvent::AcceptError(_)
            | ServerEvent::ResourceError { .. } => Level::ERROR,
            ServerEvent::ConnectionError { .. } | ServerEvent::MaterialUnreadable(_) => Level::WARN,
            _ => Level::INFO,
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEvent::Listening { server, address } => {
                write!(f, "{} is listening on {}", server, address)
            }
            ServerEvent::Stopped { server } => write!(f, "{} stopped", server),
            ServerEvent::ConnectionOpened => f.write_str("[WebSocket connection opened]"),
            ServerEvent::ConnectionClosed => f.write_str("[WebSocket connection closed]"),
            ServerEvent::MessageReceived(message) => write!(f, "=> \"{}\"", message),
            ServerEvent::MessageEchoed(message) => write!(f, "<= \"{}\"", message),
            ServerEvent::SessionError(error) => write!(f, "[WebSocket error] {}", error),
            ServerEvent::ConnectionError { peer, error } => {
                write!(f, "Connection from {} failed: {}", peer, error)
            }
            ServerEvent::AcceptError(error) => write!(f, "Accept error: {}", error),
            ServerEvent::ResourceError { path, error } => {
                write!(f, "Failed to load {}: {}", path, error)
            }
            ServerEvent::ReadingCertificate(path) => {
                write!(f, "Reading certificate from: {}", path.display())
            }
            ServerEvent::ReadingKey(path) => write!(f, "Reading key from: {}", path.display()),
            ServerEvent::MaterialUnreadable(error) => {
                write!(f, "Existing TLS material unusable ({}), regenerating", error)
            }
            ServerEvent::GeneratingCertificate => {
                f.write_str("Beginning generation of self-signed certificate")
            }
            ServerEvent::WritingKey(path) => write!(f, "Writing key to: {}", path.display()),
            ServerEvent::WritingCertificate(path) => {
                write!(f, "Writing certificate to: {}", path.display())
            }
        }
    }
}

/// Destination for [`ServerEvent`]s
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Record one event
    fn emit(&self, event: ServerEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ServerEvent) {
        let level = event.level();
        if level == Level::ERROR {
            tracing::error!("{}", event);
        } else if level == Level::WARN {
            tracing::warn!("{}", event);
        } else {
            tracing::info!("{}", event);
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ServerEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<ServerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any recorded event matches
    pub fn contains(&self, predicate: impl Fn(&ServerEvent) -> bool) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(predicate)
    }

    /// Rendered log lines, in order
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ServerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Initialize logging subsystem
///
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
