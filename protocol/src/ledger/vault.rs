//! # Vault
//!
//! A node's private store of the states it participates in. Written only by
//! the commit service, read by flows.
//!
//! States are never deleted: consuming a state flips its status, so the
//! vault can answer both "what is live now" and "what happened".
//!
//! A vault opened with [`Vault::for_keys`] only stores produced states that
//! name one of the node's keys as a participant. A party written out of a
//! state by a transaction still sees its input consumed, but never holds
//! the successor.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::state::{ContractState, LinearState, StateAndRef, StateRef};
use crate::crypto::hash::SecureHash;
use crate::identity::keys::KeyManagementService;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateStatus {
    Unconsumed,
    Consumed { by: SecureHash },
}

struct Entry<S> {
    state: StateAndRef<S>,
    status: StateStatus,
}

struct Inner<S> {
    states: BTreeMap<StateRef, Entry<S>>,
    // Insertion order, for `unconsumed()` stability.
    order: Vec<StateRef>,
    transactions: Vec<SecureHash>,
}

pub struct Vault<S> {
    owner: String,
    keys: Option<Arc<KeyManagementService>>,
    inner: RwLock<Inner<S>>,
}

impl<S: ContractState> Vault<S> {
    /// A vault that stores every state it is given.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            keys: None,
            inner: RwLock::new(Inner {
                states: BTreeMap::new(),
                order: Vec::new(),
                transactions: Vec::new(),
            }),
        }
    }

    /// A vault that stores only states relevant to `keys`.
    pub fn for_keys(owner: impl Into<String>, keys: Arc<KeyManagementService>) -> Self {
        Self {
            keys: Some(keys),
            ..Self::new(owner)
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether `state` names one of this vault's keys as a participant.
    pub fn is_relevant(&self, state: &S) -> bool {
        match &self.keys {
            None => true,
            Some(keys) => state.participants().iter().any(|p| keys.owns(&p.owning_key())),
        }
    }

    /// Apply a committed transaction: mark `consumed` and store the
    /// relevant part of `produced`. Consumed refs this vault never saw are
    /// ignored.
    pub fn record(&self, tx_id: SecureHash, consumed: &[StateRef], produced: Vec<StateAndRef<S>>) {
        let mut inner = self.inner.write();
        if inner.transactions.contains(&tx_id) {
            return;
        }
        for state_ref in consumed {
            if let Some(entry) = inner.states.get_mut(state_ref) {
                entry.status = StateStatus::Consumed { by: tx_id };
            }
        }
        for state in produced.into_iter().filter(|s| self.is_relevant(&s.state)) {
            let state_ref = state.state_ref;
            inner.order.push(state_ref);
            inner.states.insert(
                state_ref,
                Entry {
                    state,
                    status: StateStatus::Unconsumed,
                },
            );
        }
        inner.transactions.push(tx_id);
    }

    pub fn unconsumed(&self) -> Vec<StateAndRef<S>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|r| inner.states.get(r))
            .filter(|e| e.status == StateStatus::Unconsumed)
            .map(|e| e.state.clone())
            .collect()
    }

    pub fn status(&self, state_ref: &StateRef) -> Option<StateStatus> {
        self.inner.read().states.get(state_ref).map(|e| e.status)
    }

    pub fn state(&self, state_ref: &StateRef) -> Option<StateAndRef<S>> {
        self.inner.read().states.get(state_ref).map(|e| e.state.clone())
    }

    /// Ids of every transaction recorded here, oldest first.
    pub fn transactions(&self) -> Vec<SecureHash> {
        self.inner.read().transactions.clone()
    }
}

impl<S: LinearState> Vault<S> {
    /// The live version of the linear state `id`, if any.
    pub fn get_linear_by_id(&self, id: Uuid) -> Option<StateAndRef<S>> {
        self.unconsumed().into_iter().find(|s| s.state.linear_id() == id)
    }

    /// Every version of `id` this vault has seen, oldest first.
    pub fn linear_history(&self, id: Uuid) -> Vec<(StateAndRef<S>, StateStatus)> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|r| inner.states.get(r))
            .filter(|e| e.state.state.linear_id() == id)
            .map(|e| (e.state.clone(), e.status))
            .collect()
    }
}
