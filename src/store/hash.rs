//! Structural content hashing for cache keys.
//!
//! Key material is hashed by structure, never by identity: two payloads
//! that serialize to the same canonical document hash identically no matter
//! how they were built. Canonical means serde_json's key-sorted object
//! serialization (the default, BTreeMap-backed `Map`). Opaque bytes are
//! hashed verbatim.

use sha2::{Digest, Sha256};

use crate::store::payload::Payload;
use crate::store::version::HASH_WIDTH;

/// Truncated SHA-256 digest of a payload's canonical serialization.
pub fn content_hash(key_data: &Payload) -> String {
    let mut hasher = Sha256::new();

    match key_data {
        Payload::Opaque(bytes) => hasher.update(bytes),
        other => {
            // to_tagged is None only for Opaque, handled above.
            let tagged = other.to_tagged().unwrap_or(serde_json::Value::Null);
            hasher.update(tagged.to_string().as_bytes());
        }
    }

    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(HASH_WIDTH);
    digest
}
