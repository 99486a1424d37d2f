//! Cache row keys using SHA-256 hashes

use sha2::{Digest, Sha256};

/// Deterministic row key for a request key within a namespace.
///
/// Namespaces are disjoint, so the namespace takes part in the hash. It is
/// length-prefixed so no split of the same bytes can collide.
pub fn cache_key(namespace: &str, request_key: &str) -> String {
    let mut hasher = Sha256::new();

    hasher.update((namespace.len() as u64).to_le_bytes());
    hasher.update(namespace.as_bytes());
    hasher.update(b"|");
    hasher.update(request_key.as_bytes());

    format!("{:x}", hasher.finalize())
}
