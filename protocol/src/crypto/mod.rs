//! # Cryptographic Primitives
//!
//! The foundation of every endorsement in Covenant:
//!
//! - **Ed25519** for signatures — deterministic, compact, well audited.
//! - **BLAKE3** for hashing — transaction ids, Merkle trees, nonces.
//!
//! Everything here is a thin, typed wrapper around audited crates. Nothing
//! is hand-rolled except the shape of the Merkle tree.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, domain_separated_hash, merkle_root, SecureHash};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
pub use signatures::{verify_all, SignatureError, TransactionSignature};
