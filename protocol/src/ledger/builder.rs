//! Transaction construction via the builder pattern.
//!
//! Add inputs, outputs and commands, optionally a time window, then
//! `.build()` to get a committed [`WireTransaction`]. The builder never
//! signs; that is the job of the node's key management service.

use super::error::LedgerError;
use super::state::{Command, CommandData, ContractState, StateAndRef, StateRef, TimeWindow};
use super::wire::WireTransaction;
use crate::crypto::keys::PublicKey;

pub struct TransactionBuilder<S, C> {
    notary: PublicKey,
    inputs: Vec<StateRef>,
    outputs: Vec<S>,
    commands: Vec<Command<C>>,
    time_window: Option<TimeWindow>,
}

impl<S: ContractState, C: CommandData> TransactionBuilder<S, C> {
    /// `notary` is the key of the commit service that will order this
    /// transaction.
    pub fn new(notary: PublicKey) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
            time_window: None,
        }
    }

    pub fn add_input_state(mut self, input: &StateAndRef<S>) -> Self {
        self.inputs.push(input.state_ref);
        self
    }

    pub fn add_output_state(mut self, state: S) -> Self {
        self.outputs.push(state);
        self
    }

    pub fn add_command(mut self, value: C, signers: impl IntoIterator<Item = PublicKey>) -> Self {
        self.commands.push(Command::new(value, signers));
        self
    }

    pub fn set_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    /// Keys that will have to sign the built transaction.
    pub fn required_signers(&self) -> Vec<PublicKey> {
        let mut keys: Vec<PublicKey> = Vec::new();
        for key in self.commands.iter().flat_map(|c| c.signers.iter()) {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
        keys
    }

    /// Commit the components under a fresh privacy salt.
    pub fn build(self) -> Result<WireTransaction<S, C>, LedgerError> {
        WireTransaction::new(
            self.inputs,
            self.outputs,
            self.commands,
            self.notary,
            self.time_window,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::SecureHash;
    use crate::crypto::keys::Keypair;
    use crate::identity::party::AbstractParty;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note(u64);

    impl ContractState for Note {
        fn participants(&self) -> Vec<AbstractParty> {
            Vec::new()
        }
    }

    #[test]
    fn builds_with_inputs_outputs_and_commands() {
        let notary = Keypair::generate().public_key();
        let alice = Keypair::generate().public_key();
        let bob = Keypair::generate().public_key();
        let prior = StateAndRef {
            state: Note(1),
            state_ref: StateRef::new(SecureHash::of(b"prior"), 0),
        };

        let builder = TransactionBuilder::<Note, String>::new(notary)
            .add_input_state(&prior)
            .add_output_state(Note(2))
            .add_command("move".into(), [alice, bob])
            .add_command("audit".into(), [bob]);
        assert_eq!(builder.required_signers(), vec![alice, bob]);

        let wtx = builder.build().unwrap();
        assert_eq!(wtx.inputs, vec![prior.state_ref]);
        assert_eq!(wtx.outputs, vec![Note(2)]);
        assert_eq!(wtx.required_signers(), vec![alice, bob]);
        assert_eq!(wtx.notary, notary);
        assert!(wtx.check_id().is_ok());
    }

    #[test]
    fn two_builds_of_same_content_get_different_ids() {
        let notary = Keypair::generate().public_key();
        let alice = Keypair::generate().public_key();
        let build = || {
            TransactionBuilder::<Note, String>::new(notary)
                .add_output_state(Note(5))
                .add_command("issue".into(), [alice])
                .build()
                .unwrap()
        };
        assert_ne!(build().id(), build().id());
    }

    #[test]
    fn empty_builder_fails() {
        let notary = Keypair::generate().public_key();
        let result = TransactionBuilder::<Note, String>::new(notary).build();
        assert!(matches!(result, Err(LedgerError::NoCommands)));
    }
}
