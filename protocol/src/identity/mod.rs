//! # Identity Module
//!
//! Who the parties are, and who is allowed to know it.
//!
//! The layers:
//!
//! 1. **Parties** — [`Party`] (name + legal key), [`AnonymousParty`] (a key
//!    and nothing else), and [`AbstractParty`] covering both.
//! 2. **Network map** — the shared directory of well-known parties.
//! 3. **Identity service** — per-node resolver: network map first, then the
//!    node's own pseudonym table.
//! 4. **Key management** — per-node keystore that mints single-use keys and
//!    signs transaction ids on request.

pub mod keys;
pub mod party;
pub mod service;

pub use keys::KeyManagementService;
pub use party::{AbstractParty, AnonymousParty, Party};
pub use service::{IdentityError, IdentityService, InMemoryIdentityService, NetworkMap};
