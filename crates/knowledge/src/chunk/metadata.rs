//! Hashing and identifiers.

use sha2::{Digest, Sha256};

/// SHA-256 of `bytes` as lowercase hex.
pub fn calculate_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Stable chunk id for `(document hash, page, position)`.
///
/// Re-ingesting the same content yields the same ids.
pub fn chunk_id(document_hash: &str, page: u32, position: usize) -> String {
    let digest = calculate_hash(format!("{}:{}:{}", document_hash, page, position).as_bytes());
    digest[..24].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_hash() {
        let hash = calculate_hash(b"Hello, world!");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, calculate_hash(b"Hello, world!"));
        assert_ne!(hash, calculate_hash(b"Different text"));
    }

    #[test]
    fn test_chunk_id_is_deterministic() {
        let a = chunk_id("abc", 3, 1);
        assert_eq!(a, chunk_id("abc", 3, 1));
        assert_ne!(a, chunk_id("abc", 3, 2));
        assert_ne!(a, chunk_id("abd", 3, 1));
        assert_eq!(a.len(), 24);
    }
}
