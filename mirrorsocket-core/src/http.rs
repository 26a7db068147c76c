//! HTTP/1.x request heads and responses
//!
//! Request heads are tokenized with `httparse`; responses are serialized by
//! hand with a fixed header order so the bytes on the wire are deterministic.

use crate::error::ProtocolError;
use crate::protocol::constants::{MAX_HEADERS, MAX_HEADER_SIZE};
use crate::protocol::{content_type, http_header, http_status, http_value};
use bytes::{BufMut, Bytes, BytesMut};

/// A parsed HTTP request head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method, as sent
    pub method: String,
    /// Request target (origin-form or absolute-form)
    pub target: String,
    /// Minor HTTP version (`0` for HTTP/1.0, `1` for HTTP/1.1)
    pub version: u8,
    /// Headers in arrival order
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// First value of the named header, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether a comma-separated header carries `token` (case-insensitive)
    pub fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, value)| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    /// Whether the client expects the connection to stay open
    pub fn keep_alive(&self) -> bool {
        if self.header_has_token(http_header::CONNECTION, http_value::CLOSE) {
            return false;
        }
        self.version >= 1 || self.header_has_token(http_header::CONNECTION, http_value::KEEP_ALIVE)
    }

    /// How the request body following this head is delimited
    pub fn body(&self) -> RequestBody {
        if self.header(http_header::TRANSFER_ENCODING).is_some() {
            return RequestBody::Unframed;
        }

        let mut lengths = self
            .headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(http_header::CONTENT_LENGTH))
            .map(|(_, value)| value.trim().parse::<u64>());

        let length = match lengths.next() {
            None => return RequestBody::Empty,
            Some(Ok(length)) => length,
            Some(Err(_)) => return RequestBody::Unframed,
        };
        if lengths.any(|other| other != Ok(length)) {
            return RequestBody::Unframed;
        }

        match length {
            0 => RequestBody::Empty,
            n => RequestBody::Length(n),
        }
    }

    /// The path component of the target, without query or fragment
    pub fn path(&self) -> String {
        match self.target.parse::<::http::Uri>() {
            Ok(uri) => uri.path().to_string(),
            Err(_) => self
                .target
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Framing of the body that follows a request head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestBody {
    /// No body
    Empty,
    /// Exactly this many bytes
    Length(u64),
    /// Chunked, or a length that cannot be trusted; the connection cannot be reused
    Unframed,
}

/// Try to parse a request head from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, or the head together with
/// the number of bytes it occupied.
pub fn parse_request_head(buf: &[u8]) -> Result<Option<(RequestHead, usize)>, ProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    let consumed = match request.parse(buf) {
        Ok(httparse::Status::Complete(consumed)) => consumed,
        Ok(httparse::Status::Partial) => {
            if buf.len() > MAX_HEADER_SIZE {
                return Err(ProtocolError::HeadTooLarge {
                    size: buf.len(),
                    max: MAX_HEADER_SIZE,
                });
            }
            return Ok(None);
        }
        Err(httparse::Error::TooManyHeaders) => {
            return Err(ProtocolError::HeadTooLarge {
                size: buf.len(),
                max: MAX_HEADER_SIZE,
            })
        }
        Err(e) => return Err(ProtocolError::MalformedRequest(e.to_string())),
    };

    if consumed > MAX_HEADER_SIZE {
        return Err(ProtocolError::HeadTooLarge {
            size: consumed,
            max: MAX_HEADER_SIZE,
        });
    }

    let malformed = |what: &str| ProtocolError::MalformedRequest(what.to_string());

    let mut parsed = Vec::with_capacity(request.headers.len());
    for header in request.headers.iter() {
        let value = std::str::from_utf8(header.value)
            .map_err(|_| malformed("header value is not UTF-8"))?;
        parsed.push((header.name.to_string(), value.trim().to_string()));
    }

    let head = RequestHead {
        method: request.method.ok_or_else(|| malformed("missing method"))?.to_string(),
        target: request.path.ok_or_else(|| malformed("missing target"))?.to_string(),
        version: request.version.ok_or_else(|| malformed("missing version"))?,
        headers: parsed,
    };

    Ok(Some((head, consumed)))
}

/// An HTTP/1.1 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Headers, written in insertion order
    pub headers: Vec<(&'static str, String)>,
    /// Body bytes
    pub body: Bytes,
}

impl Response {
    /// Create an empty response with the given status
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Set the body along with its content type and length
    pub fn body(mut self, body: Bytes, content_type: &str) -> Self {
        self.headers.retain(|(name, _)| {
            *name != http_header::CONTENT_TYPE && *name != http_header::CONTENT_LENGTH
        });
        self.headers
            .push((http_header::CONTENT_TYPE, content_type.to_string()));
        self.headers
            .push((http_header::CONTENT_LENGTH, body.len().to_string()));
        self.body = body;
        self
    }

    /// `200 OK` carrying a file
    pub fn ok(body: Bytes, content_type: &str) -> Self {
        Self::new(http_status::OK).body(body, content_type)
    }

    /// `404 Not Found` with an empty body
    pub fn not_found() -> Self {
        Self::new(http_status::NOT_FOUND).header(http_header::CONTENT_LENGTH, "0")
    }

    /// `405 Method Not Allowed`; the connection is closed afterwards
    pub fn method_not_allowed() -> Self {
        Self::new(http_status::METHOD_NOT_ALLOWED)
            .body(Bytes::from_static(b"Try GET /"), content_type::TEXT_PLAIN)
            .header(http_header::CONNECTION, http_value::CLOSE)
    }

    /// `400 Bad Request`; the connection is closed afterwards
    pub fn bad_request() -> Self {
        Self::new(http_status::BAD_REQUEST)
            .header(http_header::CONTENT_LENGTH, "0")
            .header(http_header::CONNECTION, http_value::CLOSE)
    }

    /// `431 Request Header Fields Too Large`; the connection is closed afterwards
    pub fn head_too_large() -> Self {
        Self::new(http_status::HEADER_FIELDS_TOO_LARGE)
            .header(http_header::CONTENT_LENGTH, "0")
            .header(http_header::CONNECTION, http_value::CLOSE)
    }

    /// Whether this response ends the connection
    pub fn closes_connection(&self) -> bool {
        self.headers.iter().any(|(name, value)| {
            *name == http_header::CONNECTION && value.eq_ignore_ascii_case(http_value::CLOSE)
        })
    }

    /// Serialize status line, headers, and body
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(128 + self.body.len());
        out.put_slice(b"HTTP/1.1 ");
        out.put_slice(self.status.to_string().as_bytes());
        out.put_u8(b' ');
        out.put_slice(http_status::reason(self.status).as_bytes());
        out.put_slice(b"\r\n");

        for (name, value) in &self.headers {
            out.put_slice(canonical_name(name).as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }

        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }
}

/// `content-type` -> `Content-Type`
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_head() {
        let raw = b"GET /public/app.js?v=2 HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\nrest";
        let (head, consumed) = parse_request_head(raw).unwrap().unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.target, "/public/app.js?v=2");
        assert_eq!(head.version, 1);
        assert_eq!(head.header("host"), Some("localhost"));
        assert_eq!(&raw[consumed..], b"rest");
        assert_eq!(head.path(), "/public/app.js");
        assert!(head.keep_alive());
    }

    #[test]
    fn test_parse_partial_head() {
        assert_eq!(parse_request_head(b"GET / HTTP/1.1\r\nHost: x\r\n").unwrap(), None);
    }

    #[test]
    fn test_parse_malformed_head() {
        let err = parse_request_head(b"GET\x01/ HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRequest(_)));
    }

    #[test]
    fn test_oversized_partial_head() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_HEADER_SIZE));
        let err = parse_request_head(&raw).unwrap_err();
        assert!(matches!(err, ProtocolError::HeadTooLarge { .. }));
    }

    #[test]
    fn test_absolute_form_and_fragment() {
        let head = RequestHead {
            method: "GET".into(),
            target: "http://example.org/public/index.html?q=1".into(),
            version: 1,
            headers: vec![],
        };
        assert_eq!(head.path(), "/public/index.html");
    }

    #[test]
    fn test_keep_alive_rules() {
        let mut head = RequestHead {
            method: "GET".into(),
            target: "/".into(),
            version: 0,
            headers: vec![],
        };
        assert!(!head.keep_alive());

        head.headers.push(("Connection".into(), "Keep-Alive".into()));
        assert!(head.keep_alive());

        head.version = 1;
        head.headers = vec![("Connection".into(), "close".into())];
        assert!(!head.keep_alive());
    }

    #[test]
    fn test_body_framing() {
        let head = |headers: &[(&str, &str)]| RequestHead {
            method: "GET".to_string(),
            target: "/".to_string(),
            version: 1,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        assert_eq!(head(&[]).body(), RequestBody::Empty);
        assert_eq!(head(&[("Content-Length", "0")]).body(), RequestBody::Empty);
        assert_eq!(head(&[("content-length", "5")]).body(), RequestBody::Length(5));
        assert_eq!(
            head(&[("Content-Length", "5"), ("Content-Length", "5")]).body(),
            RequestBody::Length(5)
        );
        assert_eq!(
            head(&[("Content-Length", "5"), ("Content-Length", "6")]).body(),
            RequestBody::Unframed
        );
        assert_eq!(head(&[("Content-Length", "-1")]).body(), RequestBody::Unframed);
        assert_eq!(
            head(&[("Transfer-Encoding", "chunked")]).body(),
            RequestBody::Unframed
        );
    }

    #[test]
    fn test_response_serialization() {
        let bytes = Response::method_not_allowed().to_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nTry GET /"));
    }

    #[test]
    fn test_not_found_has_empty_body() {
        let response = Response::not_found();
        assert!(response.body.is_empty());
        assert!(!response.closes_connection());
        let bytes = response.to_bytes();
        assert!(bytes.ends_with(b"Content-Length: 0\r\n\r\n"));
    }
}
