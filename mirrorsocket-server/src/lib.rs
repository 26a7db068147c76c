//! MirrorSocket Server
//!
//! Static file and WebSocket echo server over HTTP and HTTPS.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mirrorsocket_server::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> mirrorsocket_core::Result<()> {
//!     let server = EchoServer::builder()
//!         .bind("localhost", 8080)
//!         .base_dir(".")
//!         .build_plain()?;
//!
//!     let addr = server.start().await?;
//!     println!("serving on {}", addr);
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/mirrorsocket-server/")]

// Public modules
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod logging;
pub mod provision;
pub mod resolver;
pub mod server;
pub mod session;
pub mod tcp_transport;
pub mod tls_transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use cache::{CachedFile, ResourceCache};
pub use config::{ServerConfig, ServerKind, TlsConfig};
pub use logging::{init_logging, EventSink, MemorySink, ServerEvent, TracingSink};
pub use provision::{build_rustls_config, provision, CertificateProfile, TlsMaterial};
pub use server::{EchoServer, Security, ServerBuilder};
pub use session::SessionManager;
