//! Prelude module with common imports
//!
//! This module re-exports the most commonly used types and traits
//! from the mirrorsocket-server crate for ergonomic imports.

// Server types
pub use crate::config::{ServerConfig, ServerKind, TlsConfig};
pub use crate::logging::{EventSink, MemorySink, ServerEvent, TracingSink};
pub use crate::provision::CertificateProfile;
pub use crate::server::{EchoServer, Security, ServerBuilder};

// Re-export core types
pub use mirrorsocket_core::prelude::*;
