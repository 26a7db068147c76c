//! Protocol constants and utilities
//!
//! HTTP status lines, header names and values, content types, and the
//! RFC 6455 handshake constants used by the echo endpoint.

/// WebSocket protocol constants
pub mod constants {
    /// WebSocket protocol version
    pub const WEBSOCKET_VERSION: &str = "13";

    /// WebSocket magic string for accept calculation
    pub const WEBSOCKET_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// Decoded length of a Sec-WebSocket-Key
    pub const WEBSOCKET_KEY_LEN: usize = 16;

    /// Maximum request head size
    pub const MAX_HEADER_SIZE: usize = 8192; // 8KB

    /// Maximum number of request headers parsed
    pub const MAX_HEADERS: usize = 64;
}

/// HTTP status codes produced by the endpoint
pub mod http_status {
    /// Switching Protocols
    pub const SWITCHING_PROTOCOLS: u16 = 101;

    /// OK
    pub const OK: u16 = 200;

    /// Bad Request
    pub const BAD_REQUEST: u16 = 400;

    /// Not Found
    pub const NOT_FOUND: u16 = 404;

    /// Method Not Allowed
    pub const METHOD_NOT_ALLOWED: u16 = 405;

    /// Request Header Fields Too Large
    pub const HEADER_FIELDS_TOO_LARGE: u16 = 431;

    /// Reason phrase for a status code
    pub fn reason(status: u16) -> &'static str {
        match status {
            SWITCHING_PROTOCOLS => "Switching Protocols",
            OK => "OK",
            BAD_REQUEST => "Bad Request",
            NOT_FOUND => "Not Found",
            METHOD_NOT_ALLOWED => "Method Not Allowed",
            HEADER_FIELDS_TOO_LARGE => "Request Header Fields Too Large",
            _ => "Unknown",
        }
    }
}

/// HTTP methods
pub mod http_method {
    /// HTTP GET method
    pub const GET: &str = "GET";
}

/// HTTP header names (lowercase for consistency)
pub mod http_header {
    /// Connection header
    pub const CONNECTION: &str = "connection";

    /// Upgrade header
    pub const UPGRADE: &str = "upgrade";

    /// Sec-WebSocket-Key header
    pub const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";

    /// Sec-WebSocket-Version header
    pub const SEC_WEBSOCKET_VERSION: &str = "sec-websocket-version";

    /// Sec-WebSocket-Accept header
    pub const SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";

    /// Content-Type header
    pub const CONTENT_TYPE: &str = "content-type";

    /// Content-Length header
    pub const CONTENT_LENGTH: &str = "content-length";

    /// Transfer-Encoding header
    pub const TRANSFER_ENCODING: &str = "transfer-encoding";
}

/// HTTP header values
pub mod http_value {
    /// WebSocket upgrade value
    pub const WEBSOCKET: &str = "websocket";

    /// Upgrade connection value
    pub const UPGRADE: &str = "Upgrade";

    /// Keep-Alive connection value
    pub const KEEP_ALIVE: &str = "keep-alive";

    /// Close connection value
    pub const CLOSE: &str = "close";
}

/// Content types the static file layer can report
pub mod content_type {
    /// JavaScript sources
    pub const APPLICATION_JAVASCRIPT: &str = "application/javascript";

    /// HTML documents
    pub const TEXT_HTML: &str = "text/html";

    /// Everything else
    pub const TEXT_PLAIN: &str = "text/plain";
}

/// Utility functions for WebSocket protocol operations
pub mod utils {
    use base64::{engine::general_purpose, Engine as _};
    use sha1::{Digest, Sha1};

    /// Compute WebSocket accept key
    pub fn calculate_accept(key: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        hasher.update(super::constants::WEBSOCKET_MAGIC.as_bytes());
        general_purpose::STANDARD.encode(hasher.finalize())
    }

    /// Validate WebSocket key format: base64 of exactly 16 bytes
    pub fn validate_key(key: &str) -> bool {
        general_purpose::STANDARD
            .decode(key)
            .map(|raw| raw.len() == super::constants::WEBSOCKET_KEY_LEN)
            .unwrap_or(false)
    }

    /// Validate WebSocket version
    pub fn validate_version(version: &str) -> bool {
        version.trim() == super::constants::WEBSOCKET_VERSION
    }
}
