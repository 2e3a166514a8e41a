//! # Filtered Transactions
//!
//! A partial view of a [`WireTransaction`] that still proves its id.
//!
//! The builder walks every component and asks a predicate whether to reveal
//! it. For each group the view then carries one of:
//!
//! - **Hidden**: the group root only. Nothing about the group leaks except
//!   that it exists.
//! - **Partial**: every leaf hash of the group plus, for each revealed
//!   component, its index, nonce and bytes. The receiver rehashes the
//!   revealed components, checks them against their leaves, rebuilds the
//!   group root, and finally the transaction root.
//!
//! Whenever a command payload is revealed, the whole Signers group is
//! revealed with it. That is what lets a signer prove it has seen *every*
//! command it is being asked to endorse: [`FilteredTransaction::check_command_visibility`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::state::{Command, CommandData, ContractState, StateRef, TimeWindow};
use super::wire::{component_leaf, component_nonce, ComponentGroup, WireTransaction};
use crate::crypto::hash::{merkle_root, SecureHash};
use crate::crypto::keys::PublicKey;

/// What the filter predicate is shown.
#[derive(Debug)]
pub enum TxComponent<'a, S, C> {
    Input(&'a StateRef),
    Output(&'a S),
    Command(&'a Command<C>),
    Notary(&'a PublicKey),
    TimeWindow(&'a TimeWindow),
}

/// A revealed component with the nonce needed to rehash it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevealedComponent {
    pub index: u32,
    pub nonce: SecureHash,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FilteredGroup {
    Hidden {
        group: ComponentGroup,
        root: SecureHash,
    },
    Partial {
        group: ComponentGroup,
        leaves: Vec<SecureHash>,
        revealed: Vec<RevealedComponent>,
    },
}

impl FilteredGroup {
    pub fn group(&self) -> ComponentGroup {
        match self {
            Self::Hidden { group, .. } | Self::Partial { group, .. } => *group,
        }
    }

    fn revealed(&self) -> &[RevealedComponent] {
        match self {
            Self::Hidden { .. } => &[],
            Self::Partial { revealed, .. } => revealed,
        }
    }

    fn is_fully_revealed(&self) -> bool {
        match self {
            Self::Hidden { root, .. } => *root == SecureHash::ZERO,
            Self::Partial { leaves, revealed, .. } => leaves.len() == revealed.len(),
        }
    }
}

/// A transaction view in which only the predicate-selected components are
/// visible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilteredTransaction {
    pub id: SecureHash,
    pub groups: Vec<FilteredGroup>,
}

impl FilteredTransaction {
    /// Build a view of `wtx` revealing exactly what `reveal` accepts, plus
    /// the Signers group whenever any command is revealed.
    pub fn build<S, C, F>(wtx: &WireTransaction<S, C>, reveal: F) -> Result<Self, LedgerError>
    where
        S: ContractState,
        C: CommandData,
        F: Fn(TxComponent<'_, S, C>) -> bool,
    {
        let bytes = wtx.component_bytes()?;
        let leaves = wtx.group_leaves()?;

        let mut picked: Vec<Vec<u32>> = vec![Vec::new(); ComponentGroup::ALL.len()];
        let pick = |items: Vec<bool>| -> Vec<u32> {
            items
                .into_iter()
                .enumerate()
                .filter(|(_, keep)| *keep)
                .map(|(i, _)| i as u32)
                .collect()
        };
        picked[0] = pick(wtx.inputs.iter().map(|i| reveal(TxComponent::Input(i))).collect());
        picked[1] = pick(wtx.outputs.iter().map(|o| reveal(TxComponent::Output(o))).collect());
        picked[2] = pick(wtx.commands.iter().map(|c| reveal(TxComponent::Command(c))).collect());
        if !picked[2].is_empty() {
            picked[3] = (0..wtx.commands.len() as u32).collect();
        }
        picked[4] = pick(vec![reveal(TxComponent::Notary(&wtx.notary))]);
        picked[5] = pick(wtx.time_window.iter().map(|t| reveal(TxComponent::TimeWindow(t))).collect());

        let groups = ComponentGroup::ALL
            .iter()
            .enumerate()
            .map(|(g, group)| {
                if picked[g].is_empty() {
                    FilteredGroup::Hidden {
                        group: *group,
                        root: merkle_root(&leaves[g]),
                    }
                } else {
                    let revealed = picked[g]
                        .iter()
                        .map(|&index| RevealedComponent {
                            index,
                            nonce: component_nonce(wtx.privacy_salt(), *group, index),
                            bytes: bytes[g][index as usize].clone(),
                        })
                        .collect();
                    FilteredGroup::Partial {
                        group: *group,
                        leaves: leaves[g].clone(),
                        revealed,
                    }
                }
            })
            .collect();

        Ok(Self { id: wtx.id(), groups })
    }

    /// Prove that the revealed components belong to a transaction with id
    /// [`Self::id`].
    pub fn verify(&self) -> Result<(), LedgerError> {
        if self.groups.len() != ComponentGroup::ALL.len() {
            return Err(LedgerError::MalformedFilter(format!(
                "expected {} groups, found {}",
                ComponentGroup::ALL.len(),
                self.groups.len()
            )));
        }

        let mut roots = Vec::with_capacity(self.groups.len());
        for (expected, filtered) in ComponentGroup::ALL.iter().zip(&self.groups) {
            if filtered.group() != *expected {
                return Err(LedgerError::MalformedFilter(format!(
                    "group {:?} out of order",
                    filtered.group()
                )));
            }
            match filtered {
                FilteredGroup::Hidden { root, .. } => roots.push(*root),
                FilteredGroup::Partial {
                    group,
                    leaves,
                    revealed,
                } => {
                    if revealed.windows(2).any(|w| w[0].index >= w[1].index) {
                        return Err(LedgerError::MalformedFilter(format!(
                            "revealed indices in {:?} are not strictly increasing",
                            group
                        )));
                    }
                    for component in revealed {
                        let leaf = leaves.get(component.index as usize).ok_or_else(|| {
                            LedgerError::MalformedFilter(format!(
                                "index {} out of range in {:?}",
                                component.index, group
                            ))
                        })?;
                        if component_leaf(&component.nonce, &component.bytes) != *leaf {
                            return Err(LedgerError::LeafMismatch {
                                group: *group,
                                index: component.index,
                            });
                        }
                    }
                    roots.push(merkle_root(leaves));
                }
            }
        }

        let recomputed = merkle_root(&roots);
        if recomputed != self.id {
            return Err(LedgerError::IdMismatch {
                claimed: self.id,
                recomputed,
            });
        }
        Ok(())
    }

    /// Fail unless every command that lists `key` as a signer is revealed.
    /// Call after [`Self::verify`].
    pub fn check_command_visibility(&self, key: &PublicKey) -> Result<(), LedgerError> {
        let signers_group = self.group(ComponentGroup::Signers)?;
        if !signers_group.is_fully_revealed() {
            return Err(LedgerError::CommandNotVisible(*key));
        }
        let signer_lists: Vec<Vec<PublicKey>> = decode_group::<Vec<PublicKey>>(signers_group)?
            .into_iter()
            .map(|(_, signers)| signers)
            .collect();

        let visible: Vec<u32> = self
            .group(ComponentGroup::Commands)?
            .revealed()
            .iter()
            .map(|c| c.index)
            .collect();

        let all_visible = signer_lists
            .iter()
            .enumerate()
            .filter(|(_, signers)| signers.contains(key))
            .all(|(i, _)| visible.contains(&(i as u32)));

        if all_visible {
            Ok(())
        } else {
            Err(LedgerError::CommandNotVisible(*key))
        }
    }

    /// Revealed commands, each paired with its signer list.
    pub fn commands<C: DeserializeOwned>(&self) -> Result<Vec<Command<C>>, LedgerError> {
        let signers: Vec<(u32, Vec<PublicKey>)> = decode_group(self.group(ComponentGroup::Signers)?)?;
        decode_group::<C>(self.group(ComponentGroup::Commands)?)?
            .into_iter()
            .map(|(index, value)| {
                let signers = signers
                    .iter()
                    .find(|(i, _)| *i == index)
                    .map(|(_, s)| s.clone())
                    .ok_or_else(|| {
                        LedgerError::MalformedFilter(format!("command {} revealed without its signers", index))
                    })?;
                Ok(Command { value, signers })
            })
            .collect()
    }

    pub fn inputs(&self) -> Result<Vec<StateRef>, LedgerError> {
        Ok(values(decode_group(self.group(ComponentGroup::Inputs)?)?))
    }

    pub fn outputs<S: DeserializeOwned>(&self) -> Result<Vec<S>, LedgerError> {
        Ok(values(decode_group(self.group(ComponentGroup::Outputs)?)?))
    }

    pub fn time_window(&self) -> Result<Option<TimeWindow>, LedgerError> {
        Ok(values(decode_group(self.group(ComponentGroup::TimeWindow)?)?)
            .into_iter()
            .next())
    }

    /// Number of revealed components across all groups.
    pub fn revealed_count(&self) -> usize {
        self.groups.iter().map(|g| g.revealed().len()).sum()
    }

    fn group(&self, group: ComponentGroup) -> Result<&FilteredGroup, LedgerError> {
        self.groups
            .get(group.ordinal() as usize)
            .filter(|g| g.group() == group)
            .ok_or_else(|| LedgerError::MalformedFilter(format!("group {:?} missing", group)))
    }
}

fn decode_group<T: DeserializeOwned>(group: &FilteredGroup) -> Result<Vec<(u32, T)>, LedgerError> {
    group
        .revealed()
        .iter()
        .map(|c| Ok((c.index, bincode::deserialize(&c.bytes)?)))
        .collect()
}

fn values<T>(indexed: Vec<(u32, T)>) -> Vec<T> {
    indexed.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::identity::party::AbstractParty;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note(u64);

    impl ContractState for Note {
        fn participants(&self) -> Vec<AbstractParty> {
            Vec::new()
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    enum Cmd {
        Move,
        Quote(u32),
    }

    struct Fixture {
        wtx: WireTransaction<Note, Cmd>,
        alice: PublicKey,
        oracle: PublicKey,
    }

    fn fixture() -> Fixture {
        let alice = Keypair::generate().public_key();
        let oracle = Keypair::generate().public_key();
        let notary = Keypair::generate().public_key();
        let wtx = WireTransaction::new(
            vec![StateRef::new(SecureHash::of(b"prev"), 0)],
            vec![Note(10_000)],
            vec![Command::new(Cmd::Move, [alice]), Command::new(Cmd::Quote(2), [alice, oracle])],
            notary,
            None,
        )
        .unwrap();
        Fixture { wtx, alice, oracle }
    }

    fn oracle_view(f: &Fixture) -> FilteredTransaction {
        let oracle = f.oracle;
        FilteredTransaction::build(&f.wtx, |c| match c {
            TxComponent::Command(cmd) => cmd.requires(&oracle) && matches!(cmd.value, Cmd::Quote(_)),
            _ => false,
        })
        .unwrap()
    }

    #[test]
    fn filtered_view_verifies_against_original_id() {
        let f = fixture();
        let ftx = oracle_view(&f);
        assert_eq!(ftx.id, f.wtx.id());
        ftx.verify().unwrap();
    }

    #[test]
    fn only_selected_command_is_revealed() {
        let f = fixture();
        let ftx = oracle_view(&f);
        let commands: Vec<Command<Cmd>> = ftx.commands().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].value, Cmd::Quote(2));
        assert!(ftx.outputs::<Note>().unwrap().is_empty());
        assert!(ftx.inputs().unwrap().is_empty());
        // 1 command + 2 signer lists
        assert_eq!(ftx.revealed_count(), 3);
    }

    #[test]
    fn oracle_sees_all_its_commands() {
        let f = fixture();
        let ftx = oracle_view(&f);
        ftx.check_command_visibility(&f.oracle).unwrap();
    }

    #[test]
    fn hidden_command_fails_visibility_for_its_signer() {
        let f = fixture();
        let ftx = oracle_view(&f);
        // Alice also signs the hidden Move command.
        assert!(matches!(
            ftx.check_command_visibility(&f.alice),
            Err(LedgerError::CommandNotVisible(_))
        ));
    }

    #[test]
    fn tampered_component_is_rejected() {
        let f = fixture();
        let mut ftx = oracle_view(&f);
        if let FilteredGroup::Partial { revealed, .. } = &mut ftx.groups[ComponentGroup::Commands as usize] {
            revealed[0].bytes = bincode::serialize(&Cmd::Quote(3)).unwrap();
        }
        assert!(matches!(ftx.verify(), Err(LedgerError::LeafMismatch { .. })));
    }

    #[test]
    fn forged_id_is_rejected() {
        let f = fixture();
        let mut ftx = oracle_view(&f);
        ftx.id = SecureHash::of(b"another transaction");
        assert!(matches!(ftx.verify(), Err(LedgerError::IdMismatch { .. })));
    }

    #[test]
    fn nothing_revealed_still_verifies() {
        let f = fixture();
        let ftx = FilteredTransaction::build(&f.wtx, |_| false).unwrap();
        ftx.verify().unwrap();
        assert_eq!(ftx.revealed_count(), 0);
        assert!(ftx.check_command_visibility(&f.oracle).is_err());
    }
}
