// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Covenant Protocol — Ledger Core
//!
//! The generic machinery underneath every Covenant workflow: who the
//! parties are, what a transaction commits to, how a third party can sign
//! part of a transaction without reading the rest, and how a finished
//! transaction reaches every participant at once or not at all.
//!
//! Nothing in this crate knows what an obligation is. States and commands
//! are type parameters; the `covenant-contracts` crate supplies them.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 keys, BLAKE3 hashing, Merkle roots, signatures
//!   over transaction ids.
//! - **identity** — well-known and pseudonymous parties, the shared network
//!   map, per-node identity resolution and key management.
//! - **ledger** — states, commands, Merkle-committed wire transactions,
//!   filtered views, signed transactions, vaults and the commit service.
//! - **session** — ordered point-to-point sessions between named parties.
//! - **config** — protocol constants every node must agree on.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod ledger;
pub mod session;
