//! Request path resolution
//!
//! Every request path is joined onto a virtual `/`, collapsed, and then
//! checked against the public prefix. [`is_public`] is the only access
//! control in the server.

use percent_encoding::percent_decode_str;

/// The single subtree clients may read
pub const PUBLIC_PREFIX: &str = "/public";

/// Resource served for `/`
pub const INDEX_RESOURCE: &str = "/public/index.html";

/// Collapse `.`, `..` and repeated separators of a path rooted at `/`.
///
/// `..` at the root stays at the root, so the result never climbs above `/`.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Normalize a request path, mapping the root onto the index resource
pub fn resolve(requested_path: &str) -> String {
    let normalized = normalize(requested_path);
    if normalized == "/" {
        INDEX_RESOURCE.to_string()
    } else {
        normalized
    }
}

/// Whether a normalized path lies inside the public subtree
pub fn is_public(normalized_path: &str) -> bool {
    match normalized_path.strip_prefix(PUBLIC_PREFIX) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Decode percent-escapes in a URL path; invalid UTF-8 is replaced
pub fn decode_path(raw_path: &str) -> String {
    percent_decode_str(raw_path).decode_utf8_lossy().into_owned()
}
