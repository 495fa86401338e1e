//! Content-addressed cache keys.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the cache key for `text` embedded with `model`.
///
/// The tag separates independent caches (`emb`, `voice`) so a key can be
/// logged without ambiguity about which cache it belongs to.
pub fn cache_key(tag: &str, model: &str, text: &str) -> String {
    format!("{tag}:{model}:{}", content_hash(text))
}
