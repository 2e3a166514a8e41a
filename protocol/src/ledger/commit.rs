//! # Commit Service
//!
//! The ordering point every flow ends at. A submitted transaction is either
//! committed into every listed participant's vault, with the service's own
//! signature attached, or rejected with nothing changed anywhere.
//!
//! Checks, in order:
//!
//! 1. the transaction names this service as its notary;
//! 2. the transaction id matches its contents;
//! 3. every attached signature verifies and every command signer signed;
//! 4. the current time lies inside the time window, if there is one;
//! 5. every participant has a vault registered here;
//! 6. under the ledger lock: every input was issued by an earlier commit
//!    and has not been consumed since.
//!
//! Every listed vault sees the inputs consumed; which outputs it keeps is
//! the vault's own relevance rule (see [`Vault::for_keys`]).
//!
//! Step 6 is the only one that can fail because of *another* transaction;
//! that is [`CommitError::Conflict`], and it is how two racing updates of
//! the same state are told apart: the first to reach the lock wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::error::LedgerError;
use super::signed::SignedTransaction;
use super::state::{CommandData, ContractState, StateAndRef, StateRef};
use super::vault::Vault;
use crate::crypto::hash::SecureHash;
use crate::crypto::keys::{Keypair, PublicKey};
use crate::crypto::signatures::TransactionSignature;
use crate::identity::party::Party;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("input {state_ref} was already consumed by {consumed_by}")]
    Conflict {
        state_ref: StateRef,
        consumed_by: SecureHash,
    },

    #[error("input {0} was never issued on this ledger")]
    UnknownInput(StateRef),

    #[error("transaction {0} is already committed")]
    AlreadyCommitted(SecureHash),

    #[error("transaction names notary {named}, this service is {actual}")]
    WrongNotary { named: PublicKey, actual: PublicKey },

    #[error("commit time {now} is outside the transaction's time window")]
    OutsideTimeWindow { now: DateTime<Utc> },

    #[error("no vault is registered for participant '{0}'")]
    UnknownParticipant(String),

    #[error(transparent)]
    Invalid(#[from] LedgerError),
}

/// A transaction as the commit service accepted it, notary signature
/// included.
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedTransaction<S, C> {
    pub transaction: SignedTransaction<S, C>,
    pub committed_at: DateTime<Utc>,
}

impl<S: ContractState, C: CommandData> CommittedTransaction<S, C> {
    pub fn id(&self) -> SecureHash {
        self.transaction.id()
    }

    /// Outputs as references into the committed transaction.
    pub fn outputs(&self) -> Vec<StateAndRef<S>> {
        self.transaction
            .tx
            .outputs
            .iter()
            .enumerate()
            .map(|(i, state)| StateAndRef {
                state: state.clone(),
                state_ref: self.transaction.tx.out_ref(i as u32),
            })
            .collect()
    }
}

/// Ordering and replication service.
#[async_trait]
pub trait CommitService<S: ContractState, C: CommandData>: Send + Sync {
    /// Key that transactions must name as their notary.
    fn notary_key(&self) -> PublicKey;

    /// Commit `stx` to every vault in `participants`, atomically.
    async fn submit(
        &self,
        stx: SignedTransaction<S, C>,
        participants: &[Party],
    ) -> Result<CommittedTransaction<S, C>, CommitError>;
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Ledger {
    issued: HashSet<StateRef>,
    consumed: HashMap<StateRef, SecureHash>,
    committed: HashSet<SecureHash>,
}

/// Single-process commit service shared by every node of a test or demo
/// network.
pub struct InMemoryLedger<S> {
    notary: Keypair,
    vaults: RwLock<HashMap<String, Arc<Vault<S>>>>,
    ledger: Mutex<Ledger>,
}

impl<S: ContractState> InMemoryLedger<S> {
    pub fn new(notary: Keypair) -> Self {
        Self {
            notary,
            vaults: RwLock::new(HashMap::new()),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn notary(&self) -> PublicKey {
        self.notary.public_key()
    }

    /// Route commits for `party` to `vault`.
    pub fn register_vault(&self, party: &Party, vault: Arc<Vault<S>>) {
        self.vaults.write().insert(party.name.clone(), vault);
    }

    pub fn committed_count(&self) -> usize {
        self.ledger.lock().committed.len()
    }

    fn resolve_vaults(&self, participants: &[Party]) -> Result<Vec<Arc<Vault<S>>>, CommitError> {
        let vaults = self.vaults.read();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut resolved = Vec::new();
        for party in participants {
            if !seen.insert(party.name.as_str()) {
                continue;
            }
            let vault = vaults
                .get(&party.name)
                .ok_or_else(|| CommitError::UnknownParticipant(party.name.clone()))?;
            resolved.push(Arc::clone(vault));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl<S: ContractState, C: CommandData> CommitService<S, C> for InMemoryLedger<S> {
    fn notary_key(&self) -> PublicKey {
        self.notary.public_key()
    }

    async fn submit(
        &self,
        stx: SignedTransaction<S, C>,
        participants: &[Party],
    ) -> Result<CommittedTransaction<S, C>, CommitError> {
        let tx_id = stx.id();

        if stx.tx.notary != self.notary.public_key() {
            return Err(CommitError::WrongNotary {
                named: stx.tx.notary,
                actual: self.notary.public_key(),
            });
        }
        stx.verify_required_signatures()?;

        let now = Utc::now();
        if let Some(window) = &stx.tx.time_window {
            if !window.contains(now) {
                warn!(tx = %tx_id, "rejected: outside time window");
                return Err(CommitError::OutsideTimeWindow { now });
            }
        }

        let vaults = self.resolve_vaults(participants)?;

        let committed = {
            let mut ledger = self.ledger.lock();
            if ledger.committed.contains(&tx_id) {
                return Err(CommitError::AlreadyCommitted(tx_id));
            }
            for input in &stx.tx.inputs {
                if let Some(by) = ledger.consumed.get(input) {
                    warn!(tx = %tx_id, input = %input, "rejected: double spend");
                    return Err(CommitError::Conflict {
                        state_ref: *input,
                        consumed_by: *by,
                    });
                }
                if !ledger.issued.contains(input) {
                    return Err(CommitError::UnknownInput(*input));
                }
            }

            for input in &stx.tx.inputs {
                ledger.consumed.insert(*input, tx_id);
            }
            for i in 0..stx.tx.outputs.len() {
                ledger.issued.insert(stx.tx.out_ref(i as u32));
            }
            ledger.committed.insert(tx_id);

            let notarised = TransactionSignature::sign(&self.notary, &tx_id);
            let mut transaction = stx;
            transaction.sigs.push(notarised);
            let committed = CommittedTransaction {
                transaction,
                committed_at: now,
            };

            let produced = committed.outputs();
            for vault in &vaults {
                vault.record(tx_id, &committed.transaction.tx.inputs, produced.clone());
            }
            committed
        };

        info!(
            tx = %tx_id,
            inputs = committed.transaction.tx.inputs.len(),
            outputs = committed.transaction.tx.outputs.len(),
            participants = vaults.len(),
            "transaction committed"
        );
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::party::AbstractParty;
    use crate::ledger::builder::TransactionBuilder;
    use crate::ledger::state::TimeWindow;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note(u64);

    impl ContractState for Note {
        fn participants(&self) -> Vec<AbstractParty> {
            Vec::new()
        }
    }

    struct Net {
        ledger: InMemoryLedger<Note>,
        alice: Keypair,
        alice_party: Party,
        alice_vault: Arc<Vault<Note>>,
    }

    fn net() -> Net {
        let ledger = InMemoryLedger::new(Keypair::generate());
        let alice = Keypair::generate();
        let alice_party = Party::new("Alice", alice.public_key());
        let alice_vault = Arc::new(Vault::new("Alice"));
        ledger.register_vault(&alice_party, Arc::clone(&alice_vault));
        Net {
            ledger,
            alice,
            alice_party,
            alice_vault,
        }
    }

    fn signed(net: &Net, builder: TransactionBuilder<Note, String>) -> SignedTransaction<Note, String> {
        let wtx = builder.build().unwrap();
        let sig = TransactionSignature::sign(&net.alice, &wtx.id());
        SignedTransaction::new(wtx, vec![sig])
    }

    fn issue(net: &Net, value: u64) -> SignedTransaction<Note, String> {
        let notary = net.ledger.notary();
        signed(
            net,
            TransactionBuilder::new(notary)
                .add_output_state(Note(value))
                .add_command("issue".into(), [net.alice.public_key()]),
        )
    }

    #[tokio::test]
    async fn commit_records_outputs_and_adds_notary_signature() {
        let net = net();
        let committed = net
            .ledger
            .submit(issue(&net, 10), &[net.alice_party.clone()])
            .await
            .unwrap();

        assert_eq!(committed.transaction.sigs.len(), 2);
        committed.transaction.verify_required_signatures().unwrap();
        assert_eq!(net.alice_vault.unconsumed(), committed.outputs());
        assert_eq!(net.ledger.committed_count(), 1);
    }

    #[tokio::test]
    async fn second_spend_of_same_input_conflicts() {
        let net = net();
        let notary = net.ledger.notary();
        let issued = net
            .ledger
            .submit(issue(&net, 10), &[net.alice_party.clone()])
            .await
            .unwrap();
        let input = issued.outputs().remove(0);

        let spend = |value| {
            signed(
                &net,
                TransactionBuilder::new(notary)
                    .add_input_state(&input)
                    .add_output_state(Note(value))
                    .add_command("move".into(), [net.alice.public_key()]),
            )
        };
        let first = spend(11);
        let second = spend(12);

        net.ledger.submit(first, &[net.alice_party.clone()]).await.unwrap();
        let err = net
            .ledger
            .submit(second, &[net.alice_party.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::Conflict { .. }));

        let live = net.alice_vault.unconsumed();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].state, Note(11));
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let net = net();
        let notary = net.ledger.notary();
        let bob = Keypair::generate().public_key();
        let stx = signed(
            &net,
            TransactionBuilder::new(notary)
                .add_output_state(Note(1))
                .add_command("issue".into(), [net.alice.public_key(), bob]),
        );
        let err = net
            .ledger
            .submit(stx, &[net.alice_party.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::Invalid(LedgerError::MissingSignatures(_))));
        assert!(net.alice_vault.unconsumed().is_empty());
    }

    #[tokio::test]
    async fn unknown_participant_aborts_before_any_vault_changes() {
        let net = net();
        let stranger = Party::new("Stranger", Keypair::generate().public_key());
        let err = net
            .ledger
            .submit(issue(&net, 10), &[net.alice_party.clone(), stranger])
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::UnknownParticipant(name) if name == "Stranger"));
        assert!(net.alice_vault.unconsumed().is_empty());
        assert_eq!(net.ledger.committed_count(), 0);
    }

    #[tokio::test]
    async fn expired_time_window_is_rejected() {
        let net = net();
        let notary = net.ledger.notary();
        let past = Utc::now() - chrono::Duration::minutes(5);
        let stx = signed(
            &net,
            TransactionBuilder::new(notary)
                .add_output_state(Note(1))
                .add_command("issue".into(), [net.alice.public_key()])
                .set_time_window(TimeWindow::between(past, past + chrono::Duration::seconds(30))),
        );
        let err = net
            .ledger
            .submit(stx, &[net.alice_party.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::OutsideTimeWindow { .. }));
    }

    #[tokio::test]
    async fn wrong_notary_is_rejected() {
        let net = net();
        let stx = signed(
            &net,
            TransactionBuilder::new(Keypair::generate().public_key())
                .add_output_state(Note(1))
                .add_command("issue".into(), [net.alice.public_key()]),
        );
        let err = net
            .ledger
            .submit(stx, &[net.alice_party.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::WrongNotary { .. }));
    }
}
