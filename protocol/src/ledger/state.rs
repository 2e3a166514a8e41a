//! The things transactions move around: states, references to them,
//! commands, and validity windows.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::crypto::hash::SecureHash;
use crate::crypto::keys::PublicKey;
use crate::identity::party::AbstractParty;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// A fact on the ledger, shared by its participants.
pub trait ContractState:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Everyone who must hold a copy of this state.
    fn participants(&self) -> Vec<AbstractParty>;
}

/// A state that evolves through successive transactions under one stable id.
pub trait LinearState: ContractState {
    fn linear_id(&self) -> Uuid;
}

/// Pointer to an output of a committed transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_id: SecureHash,
    pub index: u32,
}

impl StateRef {
    pub fn new(tx_id: SecureHash, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", &self.tx_id.to_hex()[..16], self.index)
    }
}

/// A state together with where it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateAndRef<S> {
    pub state: S,
    pub state_ref: StateRef,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Payload of a command. Blanket-implemented for anything serialisable.
pub trait CommandData:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> CommandData for T where
    T: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// A command and the keys that must sign for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command<C> {
    pub value: C,
    pub signers: Vec<PublicKey>,
}

impl<C> Command<C> {
    /// Duplicate signers are collapsed, first occurrence wins.
    pub fn new(value: C, signers: impl IntoIterator<Item = PublicKey>) -> Self {
        let mut unique: Vec<PublicKey> = Vec::new();
        for key in signers {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        Self {
            value,
            signers: unique,
        }
    }

    pub fn requires(&self, key: &PublicKey) -> bool {
        self.signers.contains(key)
    }
}

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Half-open interval `[from, until)` during which a transaction may commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { from, until }
    }

    /// `[now, now + length)`.
    pub fn from_now(length: std::time::Duration) -> Self {
        let from = Utc::now();
        let length = Duration::from_std(length).unwrap_or_else(|_| Duration::seconds(0));
        Self {
            from,
            until: from + length,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant < self.until
    }
}
