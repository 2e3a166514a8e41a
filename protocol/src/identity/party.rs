//! Parties: who signs, who owns, who can be resolved by whom.
//!
//! A [`Party`] is a well-known identity: a name bound to a long-term key,
//! published in the network map. An [`AnonymousParty`] is just a key; only
//! nodes holding a registered mapping can tell who is behind it.
//! [`AbstractParty`] is what ledger states store, because a state does not
//! care which of the two it is holding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::keys::PublicKey;

/// A well-known identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: PublicKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }

    pub fn anonymise(&self) -> AnonymousParty {
        AnonymousParty {
            owning_key: self.owning_key,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A bare key standing in for a party.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnonymousParty {
    pub owning_key: PublicKey,
}

impl AnonymousParty {
    pub fn new(owning_key: PublicKey) -> Self {
        Self { owning_key }
    }
}

impl fmt::Display for AnonymousParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Anonymous({})", self.owning_key.short())
    }
}

/// Either kind of party.
///
/// Protocol-level identity is the owning key: two `AbstractParty` values
/// refer to the same participant iff [`same_as`](Self::same_as) holds, even
/// if one is the well-known form and the other the anonymous form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbstractParty {
    WellKnown(Party),
    Anonymous(AnonymousParty),
}

impl AbstractParty {
    pub fn owning_key(&self) -> PublicKey {
        match self {
            Self::WellKnown(party) => party.owning_key,
            Self::Anonymous(anon) => anon.owning_key,
        }
    }

    pub fn same_as(&self, other: &AbstractParty) -> bool {
        self.owning_key() == other.owning_key()
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }

    pub fn as_well_known(&self) -> Option<&Party> {
        match self {
            Self::WellKnown(party) => Some(party),
            Self::Anonymous(_) => None,
        }
    }
}

impl From<Party> for AbstractParty {
    fn from(party: Party) -> Self {
        Self::WellKnown(party)
    }
}

impl From<AnonymousParty> for AbstractParty {
    fn from(anon: AnonymousParty) -> Self {
        Self::Anonymous(anon)
    }
}

impl fmt::Display for AbstractParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WellKnown(party) => write!(f, "{}", party),
            Self::Anonymous(anon) => write!(f, "{}", anon),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;

    #[test]
    fn same_as_compares_keys_across_forms() {
        let kp = Keypair::generate();
        let party = Party::new("Alice", kp.public_key());
        let well_known = AbstractParty::from(party.clone());
        let anonymous = AbstractParty::from(party.anonymise());
        assert_ne!(well_known, anonymous);
        assert!(well_known.same_as(&anonymous));
    }

    #[test]
    fn distinct_keys_are_distinct_parties() {
        let a = AbstractParty::from(AnonymousParty::new(Keypair::generate().public_key()));
        let b = AbstractParty::from(AnonymousParty::new(Keypair::generate().public_key()));
        assert!(!a.same_as(&b));
    }

    #[test]
    fn anonymous_display_hides_name() {
        let party = Party::new("Alice", Keypair::generate().public_key());
        let shown = AbstractParty::from(party.anonymise()).to_string();
        assert!(shown.starts_with("Anonymous("));
        assert!(!shown.contains("Alice"));
    }
}
