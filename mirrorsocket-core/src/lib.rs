//! # MirrorSocket Core
//!
//! Protocol foundation shared by the MirrorSocket server crates.
//!
//! This is the core library of MirrorSocket. It includes:
//!
//! - Error handling and types
//! - HTTP request-head parsing and response serialization
//! - The server side of the WebSocket opening handshake
//! - Protocol constants and utilities
//! - Transport layer abstractions

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/mirrorsocket-core/")]

// Core modules
pub mod error;
pub mod handshake;
pub mod http;
pub mod protocol;
pub mod transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use error::{Error, Result};
pub use crate::http::{RequestBody, RequestHead, Response};
pub use transport::{Transport, TransportStream};
