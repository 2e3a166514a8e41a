//! # Wire Transactions
//!
//! The unsigned, Merkle-committed form of a transaction.
//!
//! ## Commitment layout
//!
//! Components are split into six groups, always in this order:
//!
//! ```text
//!   0 Inputs      StateRef per consumed state
//!   1 Outputs     one serialised state per output
//!   2 Commands    command payloads
//!   3 Signers     signer list of each command, same index as Commands
//!   4 Notary      the commit service's key
//!   5 TimeWindow  zero or one window
//! ```
//!
//! Each component is encoded with bincode and hashed together with a nonce
//! derived from the transaction's privacy salt, its group and its index.
//! Leaves of a group form a Merkle tree; the six group roots form the
//! transaction tree whose root is the transaction id.
//!
//! Splitting command payloads from their signers is what lets a filtered
//! view reveal *which* commands a key must sign without revealing what the
//! other commands say.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::state::{Command, CommandData, ContractState, StateRef, TimeWindow};
use crate::config::{COMPONENT_LEAF_CONTEXT, COMPONENT_NONCE_CONTEXT, PRIVACY_SALT_LENGTH};
use crate::crypto::hash::{domain_separated_hash, merkle_root, SecureHash};
use crate::crypto::keys::PublicKey;

/// Component groups in commitment order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComponentGroup {
    Inputs = 0,
    Outputs = 1,
    Commands = 2,
    Signers = 3,
    Notary = 4,
    TimeWindow = 5,
}

impl ComponentGroup {
    pub const ALL: [ComponentGroup; 6] = [
        ComponentGroup::Inputs,
        ComponentGroup::Outputs,
        ComponentGroup::Commands,
        ComponentGroup::Signers,
        ComponentGroup::Notary,
        ComponentGroup::TimeWindow,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

/// Per-component nonce.
pub fn component_nonce(salt: &[u8; PRIVACY_SALT_LENGTH], group: ComponentGroup, index: u32) -> SecureHash {
    let mut data = Vec::with_capacity(PRIVACY_SALT_LENGTH + 5);
    data.extend_from_slice(salt);
    data.push(group.ordinal());
    data.extend_from_slice(&index.to_le_bytes());
    SecureHash::from_bytes(domain_separated_hash(COMPONENT_NONCE_CONTEXT, &data))
}

/// Leaf hash of a component: `H(nonce || bytes)` under the leaf context.
pub fn component_leaf(nonce: &SecureHash, bytes: &[u8]) -> SecureHash {
    let mut data = Vec::with_capacity(32 + bytes.len());
    data.extend_from_slice(nonce.as_bytes());
    data.extend_from_slice(bytes);
    SecureHash::from_bytes(domain_separated_hash(COMPONENT_LEAF_CONTEXT, &data))
}

/// An unsigned transaction plus its cached id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireTransaction<S, C> {
    pub inputs: Vec<StateRef>,
    pub outputs: Vec<S>,
    pub commands: Vec<Command<C>>,
    pub notary: PublicKey,
    pub time_window: Option<TimeWindow>,
    privacy_salt: [u8; PRIVACY_SALT_LENGTH],
    id: SecureHash,
}

impl<S: ContractState, C: CommandData> WireTransaction<S, C> {
    /// Assemble and commit with a fresh random salt.
    pub fn new(
        inputs: Vec<StateRef>,
        outputs: Vec<S>,
        commands: Vec<Command<C>>,
        notary: PublicKey,
        time_window: Option<TimeWindow>,
    ) -> Result<Self, LedgerError> {
        let mut salt = [0u8; PRIVACY_SALT_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self::with_salt(inputs, outputs, commands, notary, time_window, salt)
    }

    /// Assemble with a caller-chosen salt. Same salt and contents give the
    /// same id.
    pub fn with_salt(
        inputs: Vec<StateRef>,
        outputs: Vec<S>,
        commands: Vec<Command<C>>,
        notary: PublicKey,
        time_window: Option<TimeWindow>,
        privacy_salt: [u8; PRIVACY_SALT_LENGTH],
    ) -> Result<Self, LedgerError> {
        if commands.is_empty() {
            return Err(LedgerError::NoCommands);
        }
        let mut tx = Self {
            inputs,
            outputs,
            commands,
            notary,
            time_window,
            privacy_salt,
            id: SecureHash::ZERO,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    pub fn id(&self) -> SecureHash {
        self.id
    }

    pub(crate) fn privacy_salt(&self) -> &[u8; PRIVACY_SALT_LENGTH] {
        &self.privacy_salt
    }

    /// Recompute the id from the contents and compare with the cached one.
    /// Anything received from a peer must pass this before it is trusted.
    pub fn check_id(&self) -> Result<(), LedgerError> {
        let recomputed = self.compute_id()?;
        if recomputed != self.id {
            return Err(LedgerError::IdMismatch {
                claimed: self.id,
                recomputed,
            });
        }
        Ok(())
    }

    /// Union of every command's signers, in first-seen order.
    pub fn required_signers(&self) -> Vec<PublicKey> {
        let mut keys: Vec<PublicKey> = Vec::new();
        for key in self.commands.iter().flat_map(|c| c.signers.iter()) {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
        keys
    }

    /// Output `index` as a reference, once this transaction is committed.
    pub fn out_ref(&self, index: u32) -> StateRef {
        StateRef::new(self.id, index)
    }

    /// Canonical bytes of every component, grouped in commitment order.
    pub(crate) fn component_bytes(&self) -> Result<Vec<Vec<Vec<u8>>>, LedgerError> {
        let encode_all = |items: Vec<Result<Vec<u8>, bincode::Error>>| -> Result<Vec<Vec<u8>>, LedgerError> {
            items.into_iter().map(|r| r.map_err(LedgerError::from)).collect()
        };

        Ok(vec![
            encode_all(self.inputs.iter().map(bincode::serialize).collect())?,
            encode_all(self.outputs.iter().map(bincode::serialize).collect())?,
            encode_all(self.commands.iter().map(|c| bincode::serialize(&c.value)).collect())?,
            encode_all(self.commands.iter().map(|c| bincode::serialize(&c.signers)).collect())?,
            vec![bincode::serialize(&self.notary)?],
            encode_all(self.time_window.iter().map(bincode::serialize).collect())?,
        ])
    }

    /// Leaf hashes of each group, in commitment order.
    pub(crate) fn group_leaves(&self) -> Result<Vec<Vec<SecureHash>>, LedgerError> {
        let groups = self.component_bytes()?;
        Ok(ComponentGroup::ALL
            .iter()
            .zip(groups.iter())
            .map(|(group, components)| {
                components
                    .iter()
                    .enumerate()
                    .map(|(i, bytes)| {
                        let nonce = component_nonce(&self.privacy_salt, *group, i as u32);
                        component_leaf(&nonce, bytes)
                    })
                    .collect()
            })
            .collect())
    }

    fn compute_id(&self) -> Result<SecureHash, LedgerError> {
        let roots: Vec<SecureHash> = self
            .group_leaves()?
            .iter()
            .map(|leaves| merkle_root(leaves))
            .collect();
        Ok(merkle_root(&roots))
    }
}
