//! WebSocket handshake implementation
//!
//! Server side of the RFC 6455 opening handshake: detect an upgrade request,
//! validate it, and build the `101 Switching Protocols` response. Framing
//! after the handshake is left to the WebSocket library.

use crate::error::ProtocolError;
use crate::http::{RequestHead, Response};
use crate::protocol::http_header::*;
use crate::protocol::{http_method, http_status, http_value, utils};

/// Compute WebSocket accept key from client key
pub fn compute_accept_key(client_key: &str) -> String {
    utils::calculate_accept(client_key)
}

/// Whether the request asks for a WebSocket upgrade at all
pub fn is_upgrade_request(request: &RequestHead) -> bool {
    request.header_has_token(UPGRADE, http_value::WEBSOCKET)
}

/// Validate an upgrade request and return the client key
pub fn validate_upgrade(request: &RequestHead) -> Result<String, ProtocolError> {
    if request.method != http_method::GET {
        return Err(ProtocolError::InvalidHeaderValue {
            header: "method".to_string(),
            value: request.method.clone(),
        });
    }

    if !request.header_has_token(CONNECTION, UPGRADE) {
        return Err(ProtocolError::InvalidHeaderValue {
            header: CONNECTION.to_string(),
            value: request.header(CONNECTION).unwrap_or_default().to_string(),
        });
    }

    let key = request
        .header(SEC_WEBSOCKET_KEY)
        .ok_or_else(|| ProtocolError::MissingHeader(SEC_WEBSOCKET_KEY.to_string()))?;
    if !utils::validate_key(key) {
        return Err(ProtocolError::InvalidHeaderValue {
            header: SEC_WEBSOCKET_KEY.to_string(),
            value: key.to_string(),
        });
    }

    let version = request
        .header(SEC_WEBSOCKET_VERSION)
        .ok_or_else(|| ProtocolError::MissingHeader(SEC_WEBSOCKET_VERSION.to_string()))?;
    if !utils::validate_version(version) {
        return Err(ProtocolError::InvalidHeaderValue {
            header: SEC_WEBSOCKET_VERSION.to_string(),
            value: version.to_string(),
        });
    }

    Ok(key.to_string())
}

/// Create the server handshake response for a validated key
pub fn accept_response(client_key: &str) -> Response {
    Response::new(http_status::SWITCHING_PROTOCOLS)
        .header(UPGRADE, http_value::WEBSOCKET)
        .header(CONNECTION, http_value::UPGRADE)
        .header(SEC_WEBSOCKET_ACCEPT, compute_accept_key(client_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parse_request_head;

    fn head(raw: &str) -> RequestHead {
        parse_request_head(raw.as_bytes()).unwrap().unwrap().0
    }

    #[test]
    fn test_accept_key_calculation() {
        let key = "dGhlIHNhbXBsZSBub25jZQ=="; // "the sample nonce"
        assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_valid_upgrade() {
        let request = head(
            "GET /chat HTTP/1.1\r\n\
             Host: example.com\r\n\
             Upgrade: websocket\r\n\
             Connection: keep-alive, Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n",
        );
        assert!(is_upgrade_request(&request));
        assert_eq!(validate_upgrade(&request).unwrap(), "dGhlIHNhbXBsZSBub25jZQ==");

        let text = String::from_utf8(accept_response("dGhlIHNhbXBsZSBub25jZQ==").to_bytes().to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Sec-Websocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    }

    #[test]
    fn test_plain_get_is_not_upgrade() {
        let request = head("GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert!(!is_upgrade_request(&request));
    }

    #[test]
    fn test_missing_key_rejected() {
        let request = head(
            "GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Version: 13\r\n\r\n",
        );
        assert_eq!(
            validate_upgrade(&request).unwrap_err(),
            ProtocolError::MissingHeader(SEC_WEBSOCKET_KEY.to_string())
        );
    }

    #[test]
    fn test_wrong_version_rejected() {
        let request = head(
            "GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 8\r\n\r\n",
        );
        assert!(matches!(
            validate_upgrade(&request),
            Err(ProtocolError::InvalidHeaderValue { ref header, .. }) if header == SEC_WEBSOCKET_VERSION
        ));
    }
}
