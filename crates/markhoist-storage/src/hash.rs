//! Configuration fingerprinting

use sha2::{Digest, Sha256};

/// Hash an ordered list of configuration fields to a lowercase hex digest.
///
/// The registry records this fingerprint when it builds a client; any change
/// to a hashed field yields a different digest and invalidates the cached
/// instance lazily on the next lookup. Fields are NUL-separated before
/// hashing so adjacent fields cannot collide by concatenation.
pub fn config_hash<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
