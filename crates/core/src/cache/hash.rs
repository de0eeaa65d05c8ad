//! Content-addressed keys for request identities.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request identity.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_request_key("GET", "http://127.0.0.1:5000/");
        let hash2 = compute_request_key("GET", "http://127.0.0.1:5000/");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_url() {
        let root = compute_request_key("GET", "http://127.0.0.1:5000/");
        let css = compute_request_key("GET", "http://127.0.0.1:5000/static/styles.css");
        assert_ne!(root, css);
    }

    #[test]
    fn test_hash_separator_prevents_collisions() {
        let a = compute_request_key("GET", "Xhttp://a/");
        let b = compute_request_key("GETX", "http://a/");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_request_key("GET", "http://127.0.0.1:5000/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
