//! Prelude module for MirrorSocket Core
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::error::{
    ConfigError, Error, LifecycleError, ProtocolError, ProvisionError, Result,
};
pub use crate::http::{parse_request_head, RequestBody, RequestHead, Response};
pub use crate::transport::{Transport, TransportStream};

// Re-export commonly used external dependencies
pub use bytes::{Bytes, BytesMut};
pub use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
