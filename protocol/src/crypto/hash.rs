//! # Hashing
//!
//! BLAKE3 everywhere. Transaction ids, component leaves, group roots and
//! component nonces are all BLAKE3 digests, and every one of them is wrapped
//! in [`SecureHash`] so a digest cannot be confused with arbitrary bytes.
//!
//! ## Merkle trees
//!
//! [`merkle_root`] is a plain binary tree: odd levels duplicate their last
//! node, a single leaf is hashed with itself so the root is always the
//! output of a hash, and the empty tree is the all-zero hash. Transaction
//! ids are two levels of these trees (leaves → group root → transaction
//! root), which is what lets a filtered view prove membership without
//! revealing siblings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecureHash([u8; 32]);

impl SecureHash {
    /// The all-zero hash. Root of an empty tree.
    pub const ZERO: SecureHash = SecureHash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hash of `data` under the default BLAKE3 mode.
    pub fn of(data: &[u8]) -> Self {
        Self(blake3_hash(data))
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({})", &self.to_hex()[..12])
    }
}

/// BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 over several slices fed in sequence. Same result as hashing their
/// concatenation, without building the buffer.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Domain-separated hash using BLAKE3's `derive_key` mode. Two different
/// contexts never collide, even over identical data.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Combine two child hashes into their parent.
pub fn hash_pair(left: &SecureHash, right: &SecureHash) -> SecureHash {
    SecureHash(blake3_hash_multi(&[left.as_bytes(), right.as_bytes()]))
}

/// Merkle root over `leaves`, in order.
pub fn merkle_root(leaves: &[SecureHash]) -> SecureHash {
    if leaves.is_empty() {
        return SecureHash::ZERO;
    }
    if leaves.len() == 1 {
        return hash_pair(&leaves[0], &leaves[0]);
    }

    let mut level: Vec<SecureHash> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [single] => hash_pair(single, single),
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
    }
    level[0]
}
