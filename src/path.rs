//! Path validation and path-id derivation (C5).
//!
//! Grounded on `original_source/alluxio/client.py` (`validate_path`,
//! `get_path_hash`): SHA-256 is the stable choice in any modern runtime, so
//! the MD5/native-hash fallback chain described in `spec.md` §4.4/§9 is
//! collapsed to "SHA-256, with a documented but practically dead fallback"
//! per `SPEC_FULL.md` §4.4 — no extra dependency is added purely to keep an
//! unreachable branch alive.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use crate::error::{DoraError, DoraResult};
use crate::hash::lookup_key;

static PATH_HASH_STRATEGY: OnceLock<PathHashStrategy> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathHashStrategy {
    Sha256,
    FallbackHash64,
}

/// Validates a UFS path matches `^[A-Za-z0-9]+://`.
pub fn validate_path(path: &str) -> DoraResult<()> {
    if path.is_empty() {
        return Err(DoraError::InvalidPath(path.to_string()));
    }
    let scheme_end = path.find("://").ok_or_else(|| DoraError::InvalidPath(path.to_string()))?;
    if scheme_end == 0 || !path[..scheme_end].chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DoraError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Stable hex digest identifying the server-side per-file page namespace.
/// The first successful hash function in the fallback chain is memoized for
/// the lifetime of the process so repeated calls stay on the same strategy.
pub fn path_id(uri: &str) -> String {
    match *PATH_HASH_STRATEGY.get_or_init(|| PathHashStrategy::Sha256) {
        PathHashStrategy::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(uri.as_bytes());
            hex::encode(hasher.finalize())
        }
        PathHashStrategy::FallbackHash64 => {
            let mut hasher = DefaultHasher::new();
            uri.hash(&mut hasher);
            format!("{:x}", hasher.finish())
        }
    }
}

/// Per-attempt 32-bit hash used to probe the ring (§4.2/§4.4).
pub fn attempt_hash(path: &str, attempt: u32) -> i32 {
    lookup_key(path, attempt)
}
