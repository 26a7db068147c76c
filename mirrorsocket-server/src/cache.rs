//! Resource cache for public files
//!
//! Maps a normalized request path to the bytes of the file behind it. Entries
//! are created on the first successful load and live until [`ResourceCache::clear`].
//! File I/O runs outside the lock; two concurrent misses on the same path
//! both read the file and the later insert wins with an identical value.

use bytes::Bytes;
use mirrorsocket_core::protocol::content_type;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A public file held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    /// File contents
    pub content: Bytes,
    /// Size in bytes
    pub length: u64,
    /// Inferred content type
    pub content_type: &'static str,
}

/// Content type by filename suffix, case-insensitive
pub fn content_type_for(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".js") {
        content_type::APPLICATION_JAVASCRIPT
    } else if lower.ends_with(".html") {
        content_type::TEXT_HTML
    } else {
        content_type::TEXT_PLAIN
    }
}

/// Normalized path -> cached file
#[derive(Debug)]
pub struct ResourceCache {
    base_dir: PathBuf,
    entries: RwLock<HashMap<String, Arc<CachedFile>>>,
}

impl ResourceCache {
    /// Create an empty cache resolving paths under `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a normalized path, loading it from disk on a miss.
    ///
    /// `Ok(None)` means there is no regular file at that path; such misses
    /// are not remembered. Other I/O failures are returned to the caller.
    pub async fn get_or_load(&self, normalized_path: &str) -> io::Result<Option<Arc<CachedFile>>> {
        if let Some(hit) = self.entries.read().await.get(normalized_path) {
            return Ok(Some(hit.clone()));
        }

        let file_path = self.base_dir.join(normalized_path.trim_start_matches('/'));
        let metadata = match tokio::fs::metadata(&file_path).await {
            Ok(metadata) => metadata,
            // NUL bytes and similar client-supplied oddities are just misses.
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::InvalidInput) => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            return Ok(None);
        }

        let content = tokio::fs::read(&file_path).await?;
        let file = Arc::new(CachedFile {
            length: content.len() as u64,
            content: Bytes::from(content),
            content_type: content_type_for(normalized_path),
        });

        self.entries
            .write()
            .await
            .insert(normalized_path.to_string(), file.clone());

        Ok(Some(file))
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of cached entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds nothing
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
