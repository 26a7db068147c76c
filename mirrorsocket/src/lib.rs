//! # MirrorSocket
//!
//! **HTTP/HTTPS static file and WebSocket echo fixture**
//!
//! MirrorSocket gives WebSocket client implementations something predictable
//! to talk to: a handful of static files under `public/`, and a WebSocket
//! endpoint on the same port that sends every message straight back. The
//! secure variant generates a self-signed certificate on first start.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mirrorsocket::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let http = EchoServer::plain(ServerConfig::from_env(ServerKind::Plain)?)?;
//!     let https = EchoServer::secure(ServerConfig::from_env(ServerKind::Secure)?)?;
//!
//!     http.start().await?;
//!     https.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     http.stop().await?;
//!     https.stop().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/mirrorsocket/")]

// Re-export core components
pub use mirrorsocket_core::*;

#[cfg(feature = "server")]
pub use mirrorsocket_server as server;

#[cfg(feature = "server")]
pub use mirrorsocket_server::{EchoServer, ServerBuilder, ServerConfig, ServerKind};

/// Prelude module with common imports
pub mod prelude {
    pub use mirrorsocket_core::prelude::*;

    #[cfg(feature = "server")]
    pub use mirrorsocket_server::prelude::*;
}
