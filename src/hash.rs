//! MurmurHash3 (32-bit, seed 0) and the consistent hash ring.
//!
//! Grounded on `original_source/alluxio/worker_ring.py`
//! (`ConsistentHashProvider._hash`, `_hash_worker_identity`) and on the
//! ring-placement idiom already present in the teacher's
//! `mesh` crate (`mesh/src/lib.rs` re-exports a `consistent_hash` module
//! for request routing); the 32-bit MurmurHash3 variant itself is
//! hand-rolled here rather than swapped for the teacher's `blake3`/`xxhash`
//! dependencies, because ring placement must match `SPEC_FULL.md` §4.2
//! bit-for-bit.

use std::collections::BTreeMap;

use crate::worker::WorkerIdentity;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// 32-bit MurmurHash3 over `data`, seed 0. Returns the signed two's
/// complement digest used directly as a ring ordering key.
pub fn murmur3_32(data: &[u8]) -> i32 {
    let mut hash: u32 = 0;
    let mut chunks = data.chunks_exact(4);

    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes(chunk.try_into().unwrap());
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);

        hash ^= k;
        hash = hash.rotate_left(13);
        hash = hash.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut k: u32 = 0;
        for (i, &b) in remainder.iter().enumerate() {
            k |= (b as u32) << (8 * i);
        }
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        hash ^= k;
    }

    hash ^= data.len() as u32;
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;

    hash as i32
}

/// Virtual-node key for worker `w`, node index `i` (§4.2): `hash3_32(identifier ‖ version_le4 ‖ i_le4)`.
pub fn virtual_node_key(identity: &WorkerIdentity, node_index: u32) -> i32 {
    let mut buf = Vec::with_capacity(16 + 4 + 4);
    buf.extend_from_slice(&identity.identifier);
    buf.extend_from_slice(&identity.version.to_le_bytes());
    buf.extend_from_slice(&node_index.to_le_bytes());
    murmur3_32(&buf)
}

/// Lookup key for a request with path `p` and 1-based attempt `a` (§4.2).
pub fn lookup_key(path: &str, attempt: u32) -> i32 {
    let mut buf = Vec::with_capacity(path.len() + 4);
    buf.extend_from_slice(path.as_bytes());
    buf.extend_from_slice(&attempt.to_le_bytes());
    murmur3_32(&buf)
}

/// Ordered mapping of `i32` hash key to `WorkerIdentity`, immutable after
/// construction. Ring construction always inserts exactly `virtual_nodes`
/// entries per worker; later insertions at a colliding key win (`BTreeMap`
/// insertion order follows iteration order of the identity map, which is
/// unspecified — this is the documented tie-break for §4.2).
#[derive(Debug, Clone)]
pub struct HashRing {
    entries: BTreeMap<i32, WorkerIdentity>,
}

impl HashRing {
    pub fn build<'a>(
        identities: impl IntoIterator<Item = &'a WorkerIdentity>,
        virtual_nodes: u32,
    ) -> Self {
        let mut entries = BTreeMap::new();
        for identity in identities {
            for i in 0..virtual_nodes {
                entries.insert(virtual_node_key(identity, i), *identity);
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ceiling-with-wraparound lookup (§3, §4.2): the identity at the
    /// smallest key strictly greater than `key`, or — if none exists — the
    /// identity at the smallest key overall.
    pub fn ceil(&self, key: i32) -> Option<WorkerIdentity> {
        self.entries
            .range((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded))
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(_, identity)| *identity)
    }

    /// Read-only iterator in key order, for testing.
    pub fn iter(&self) -> impl Iterator<Item = (i32, WorkerIdentity)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: u8) -> WorkerIdentity {
        let mut bytes = [0u8; 16];
        bytes[0] = id;
        WorkerIdentity::new(1, bytes)
    }

    #[test]
    fn ring_has_exactly_v_times_n_entries() {
        let workers: Vec<_> = (0..3).map(identity).collect();
        let ring = HashRing::build(&workers, 5);
        assert_eq!(ring.len(), 15);
    }

    #[test]
    fn ceil_wraps_around() {
        let workers: Vec<_> = (0..3).map(identity).collect();
        let ring = HashRing::build(&workers, 5);
        let max_key = ring.iter().map(|(k, _)| k).max().unwrap();
        let wrapped = ring.ceil(max_key).unwrap();
        let first = ring.iter().next().unwrap().1;
        assert_eq!(wrapped, first);
    }

    #[test]
    fn ceil_defined_for_every_attempt_with_one_worker() {
        let workers = vec![identity(0)];
        let ring = HashRing::build(&workers, 5);
        for attempt in 1..=100u32 {
            let key = lookup_key("s3://bucket/x", attempt);
            assert!(ring.ceil(key).is_some());
        }
    }

    #[test]
    fn murmur3_32_matches_known_vector() {
        // MurmurHash3_x86_32("", seed=0) == 0
        assert_eq!(murmur3_32(b""), 0);
        // MurmurHash3_x86_32("test", seed=0) == 0xba6bd213 (signed: -1167338989)
        assert_eq!(murmur3_32(b"test"), -1167338989);
    }
}
