//! Identity resolution.
//!
//! Two sources of truth feed the resolver:
//!
//! 1. The [`NetworkMap`], shared by every node, listing well-known parties
//!    and their legal keys. Anybody can resolve these.
//! 2. A node-local pseudonym table populated by the confidential identity
//!    exchange. Only nodes that took part in an exchange hold the mapping,
//!    which is the whole point.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::party::{AbstractParty, Party};
use crate::crypto::keys::PublicKey;

/// Identity lookups that can fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no well-known identity is known for key {0}")]
    UnknownKey(PublicKey),

    #[error("key {key} is already registered to {existing}")]
    KeyAlreadyRegistered { key: PublicKey, existing: String },

    #[error("party name '{0}' is already in the network map with another key")]
    DuplicateName(String),
}

// ---------------------------------------------------------------------------
// NetworkMap
// ---------------------------------------------------------------------------

/// Directory of well-known parties, shared between every node of a network.
#[derive(Default)]
pub struct NetworkMap {
    by_key: RwLock<HashMap<PublicKey, Party>>,
}

impl NetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a party. Re-publishing the same party is a no-op.
    pub fn publish(&self, party: Party) -> Result<(), IdentityError> {
        let mut map = self.by_key.write();
        if let Some(existing) = map.values().find(|p| p.name == party.name) {
            if existing.owning_key != party.owning_key {
                return Err(IdentityError::DuplicateName(party.name));
            }
        }
        map.insert(party.owning_key, party);
        Ok(())
    }

    pub fn party_from_key(&self, key: &PublicKey) -> Option<Party> {
        self.by_key.read().get(key).cloned()
    }

    pub fn party_from_name(&self, name: &str) -> Option<Party> {
        self.by_key.read().values().find(|p| p.name == name).cloned()
    }

    pub fn parties(&self) -> Vec<Party> {
        let mut parties: Vec<Party> = self.by_key.read().values().cloned().collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name));
        parties
    }
}

// ---------------------------------------------------------------------------
// IdentityService
// ---------------------------------------------------------------------------

/// The resolver capability injected into anything that needs to turn a
/// participant back into a real-world identity.
pub trait IdentityService: Send + Sync {
    /// Resolve any party to its well-known form, if this node can.
    fn well_known_party_from_anonymous(&self, party: &AbstractParty) -> Option<Party>;

    /// Resolve a key to its well-known owner, if this node can.
    fn party_from_key(&self, key: &PublicKey) -> Option<Party>;

    /// Bind a pseudonymous key to its owner in this node's store.
    fn register_key(&self, key: PublicKey, owner: Party) -> Result<(), IdentityError>;

    /// Resolve or fail.
    fn require_well_known_party(&self, party: &AbstractParty) -> Result<Party, IdentityError> {
        self.well_known_party_from_anonymous(party)
            .ok_or_else(|| IdentityError::UnknownKey(party.owning_key()))
    }
}

/// Identity service backed by the shared network map plus a local
/// pseudonym table.
pub struct InMemoryIdentityService {
    network_map: Arc<NetworkMap>,
    pseudonyms: RwLock<HashMap<PublicKey, Party>>,
}

impl InMemoryIdentityService {
    pub fn new(network_map: Arc<NetworkMap>) -> Self {
        Self {
            network_map,
            pseudonyms: RwLock::new(HashMap::new()),
        }
    }

    pub fn network_map(&self) -> &Arc<NetworkMap> {
        &self.network_map
    }

    /// Number of pseudonyms this node can resolve.
    pub fn pseudonym_count(&self) -> usize {
        self.pseudonyms.read().len()
    }
}

impl IdentityService for InMemoryIdentityService {
    fn well_known_party_from_anonymous(&self, party: &AbstractParty) -> Option<Party> {
        match party {
            AbstractParty::WellKnown(p) => Some(p.clone()),
            AbstractParty::Anonymous(anon) => self.party_from_key(&anon.owning_key),
        }
    }

    fn party_from_key(&self, key: &PublicKey) -> Option<Party> {
        self.network_map
            .party_from_key(key)
            .or_else(|| self.pseudonyms.read().get(key).cloned())
    }

    fn register_key(&self, key: PublicKey, owner: Party) -> Result<(), IdentityError> {
        let mut table = self.pseudonyms.write();
        if let Some(existing) = table.get(&key) {
            if existing != &owner {
                return Err(IdentityError::KeyAlreadyRegistered {
                    key,
                    existing: existing.name.clone(),
                });
            }
            return Ok(());
        }
        debug!(key = %key.short(), owner = %owner.name, "registered pseudonym");
        table.insert(key, owner);
        Ok(())
    }
}
