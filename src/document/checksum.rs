//! SHA-256 content fingerprints for local documents.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the exact bytes given.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compare two hex fingerprints, ignoring case.
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
