//! Echo server lifecycle
//!
//! [`EchoServer`] binds a plain or TLS listener, runs the accept loop on a
//! background task, and tears everything down again on [`EchoServer::stop`].
//! A stopped server can be started again.

use crate::cache::ResourceCache;
use crate::config::{ServerConfig, TlsConfig};
use crate::endpoint::Endpoint;
use crate::logging::{EventSink, ServerEvent, TracingSink};
use crate::provision::{self, CertificateProfile};
use crate::session::SessionManager;
use crate::tcp_transport::TcpTransport;
use crate::tls_transport::TlsTransport;
use mirrorsocket_core::error::{ConfigError, Error, LifecycleError};
use mirrorsocket_core::{Result, Transport};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Name of the plain server
pub const HTTP_SERVER_NAME: &str = "HTTP Server";

/// Name of the TLS server
pub const HTTPS_SERVER_NAME: &str = "HTTPS Server";

/// Transport security of a server
#[derive(Clone)]
pub enum Security {
    /// Plain TCP
    Plain,
    /// TLS with the given rustls configuration
    Secure(Arc<rustls::ServerConfig>),
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Security::Plain => f.write_str("Plain"),
            Security::Secure(_) => f.write_str("Secure(..)"),
        }
    }
}

/// Everything that exists only while the server runs
#[derive(Debug)]
struct Running {
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    sessions: Arc<SessionManager>,
}

/// Static file + WebSocket echo server
#[derive(Debug)]
pub struct EchoServer {
    config: ServerConfig,
    security: Security,
    cache: Arc<ResourceCache>,
    sink: Arc<dyn EventSink>,
    state: Mutex<Option<Running>>,
    bound: StdMutex<Option<SocketAddr>>,
}

impl EchoServer {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Plain HTTP server logging through `tracing`
    pub fn plain(config: ServerConfig) -> Result<Self> {
        Self::with_security(config, Security::Plain, Arc::new(TracingSink))
    }

    /// TLS server logging through `tracing`.
    ///
    /// Certificate material is provisioned here, so a missing certificate is
    /// generated (and persisted) before the server exists.
    pub fn secure(config: ServerConfig) -> Result<Self> {
        ServerBuilder::from_config(config).build_secure()
    }

    fn with_security(config: ServerConfig, security: Security, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache: Arc::new(ResourceCache::new(config.base_dir.clone())),
            config,
            security,
            sink,
            state: Mutex::new(None),
            bound: StdMutex::new(None),
        })
    }

    /// `"HTTP Server"` or `"HTTPS Server"`
    pub fn name(&self) -> &'static str {
        match self.security {
            Security::Plain => HTTP_SERVER_NAME,
            Security::Secure(_) => HTTPS_SERVER_NAME,
        }
    }

    /// The configuration this server was built from
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Address the listener is bound to, while running
    pub fn bound_address(&self) -> Option<SocketAddr> {
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of resources currently held in the cache
    pub async fn cached_resources(&self) -> usize {
        self.cache.len().await
    }

    /// Number of open WebSocket sessions
    pub async fn active_sessions(&self) -> usize {
        match self.state.lock().await.as_ref() {
            Some(running) => running.sessions.active().await,
            None => 0,
        }
    }

    /// Bind and start accepting connections
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(LifecycleError::AlreadyRunning(self.name().to_string()).into());
        }

        let target = format!("{}:{}", self.config.address, self.config.port);
        let addr = tokio::net::lookup_host((self.config.address.as_str(), self.config.port))
            .await?
            .next()
            .ok_or(LifecycleError::Unresolvable(target))?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let sessions = Arc::new(SessionManager::new(self.sink.clone()));
        let endpoint = Endpoint::new(
            self.cache.clone(),
            sessions.clone(),
            self.sink.clone(),
            shutdown_rx.clone(),
        );

        let (local_addr, accept_task) = match &self.security {
            Security::Plain => {
                let transport = TcpTransport::bind(addr).await?;
                let local_addr = transport.local_addr()?;
                (local_addr, tokio::spawn(accept_loop(transport, endpoint, shutdown_rx)))
            }
            Security::Secure(tls) => {
                let transport = TlsTransport::bind(addr, tls.clone()).await?;
                let local_addr = transport.local_addr()?;
                (local_addr, tokio::spawn(accept_loop(transport, endpoint, shutdown_rx)))
            }
        };

        *state = Some(Running {
            shutdown,
            accept_task,
            sessions,
        });
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        self.sink.emit(ServerEvent::Listening {
            server: self.name().to_string(),
            address: local_addr,
        });
        Ok(local_addr)
    }

    /// Stop accepting, then close every WebSocket session.
    ///
    /// Both steps always run; the first failure is returned.
    pub async fn stop(&self) -> Result<()> {
        let running = self
            .state
            .lock()
            .await
            .take()
            .ok_or_else(|| LifecycleError::NotRunning(self.name().to_string()))?;

        self.cache.clear().await;

        running.shutdown.send_replace(true);
        let listener = running
            .accept_task
            .await
            .map_err(|e| Error::Lifecycle(LifecycleError::Join(e.to_string())));
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let sessions = running.sessions.close_all().await;

        self.sink.emit(ServerEvent::Stopped {
            server: self.name().to_string(),
        });
        listener.and(sessions)
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Some(running) = self.state.get_mut().take() {
            running.shutdown.send_replace(true);
            running.sessions.signal_close();
        }
    }
}

/// Accept connections until shutdown; the listener is dropped on return
async fn accept_loop<T: Transport>(transport: T, endpoint: Endpoint, mut shutdown: watch::Receiver<bool>) {
    loop {
        let stopping = *shutdown.borrow_and_update();
        if stopping {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = transport.accept() => match accepted {
                Ok((handshake, peer)) => {
                    let endpoint = endpoint.clone();
                    tokio::spawn(async move {
                        let served = match handshake.await {
                            Ok(stream) => endpoint.serve_connection(stream).await,
                            Err(e) => Err(e),
                        };
                        if let Err(e) = served {
                            endpoint.sink().emit(ServerEvent::ConnectionError {
                                peer,
                                error: e.to_string(),
                            });
                        }
                    });
                }
                Err(e) => endpoint.sink().emit(ServerEvent::AcceptError(e.to_string())),
            }
        }
    }
}

/// Builder for [`EchoServer`]
#[derive(Debug)]
pub struct ServerBuilder {
    config: ServerConfig,
    sink: Option<Arc<dyn EventSink>>,
    profile: CertificateProfile,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Start from an existing configuration
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            sink: None,
            profile: CertificateProfile::default(),
        }
    }

    /// Bind to the given address and port (`0` for ephemeral)
    pub fn bind(mut self, address: impl Into<String>, port: u16) -> Self {
        self.config.address = address.into();
        self.config.port = port;
        self
    }

    /// Directory containing `public/`
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = dir.into();
        self
    }

    /// Certificate and key locations for the secure server
    pub fn tls(mut self, cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        self.config.tls = Some(TlsConfig::new(cert_file, key_file));
        self
    }

    /// Report events somewhere other than `tracing`
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Parameters for a generated certificate
    pub fn certificate_profile(mut self, profile: CertificateProfile) -> Self {
        self.profile = profile;
        self
    }

    fn take_sink(&mut self) -> Arc<dyn EventSink> {
        self.sink.take().unwrap_or_else(|| Arc::new(TracingSink))
    }

    /// Build a plain HTTP server
    pub fn build_plain(mut self) -> Result<EchoServer> {
        let sink = self.take_sink();
        EchoServer::with_security(self.config, Security::Plain, sink)
    }

    /// Build a TLS server, provisioning certificate material first
    pub fn build_secure(mut self) -> Result<EchoServer> {
        let sink = self.take_sink();
        self.config.validate()?;
        let tls = self.config.tls.clone().ok_or_else(|| {
            Error::Config(ConfigError::MissingField {
                field: "tls".to_string(),
            })
        })?;

        let material = provision::provision(&tls, &self.profile, sink.as_ref())?;
        let rustls_config = provision::build_rustls_config(&material)?;

        EchoServer::with_security(self.config, Security::Secure(Arc::new(rustls_config)), sink)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
