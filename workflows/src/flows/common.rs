//! The proposal pipeline shared by every obligation flow, and the checks
//! every counterparty applies to a change of an existing obligation.

use covenant_contracts::{Obligation, ObligationCommand};
use covenant_protocol::crypto::PublicKey;
use covenant_protocol::identity::{AbstractParty, Party};
use covenant_protocol::ledger::{
    ContractState, SignedTransaction, StateAndRef, StateStatus, TimeWindow, TransactionBuilder,
};
use covenant_protocol::session::FlowSession;
use tracing::debug;

use crate::collect::{abort_sessions, collect_signatures, finalise, sign_and_await_finality};
use crate::error::FlowError;
use crate::node::Node;
use crate::oracle_signature::request_oracle_signature;
use crate::progress::{FlowStep, ProgressTracker};
use crate::{CommittedObligation, ObligationTransaction};

/// What a flow wants committed.
pub(crate) struct Proposal {
    pub input: Option<StateAndRef<Obligation>>,
    pub output: Option<Obligation>,
    pub command: ObligationCommand,
    /// Oracle whose signature must be obtained before collection.
    pub oracle: Option<Party>,
    pub time_window: Option<TimeWindow>,
}

impl Proposal {
    /// Owning keys of every input and output participant, plus the oracle's.
    fn signers(&self) -> Vec<PublicKey> {
        let mut keys: Vec<PublicKey> = self
            .input
            .iter()
            .flat_map(|i| i.state.participants())
            .chain(self.output.iter().flat_map(|o| o.participants()))
            .map(|p| p.owning_key())
            .collect();
        keys.extend(self.oracle.iter().map(|o| o.owning_key));
        keys
    }
}

/// BUILDING → SIGNING → COLLECTING → FINALISING → COMMITTED.
///
/// `sessions` must be open to every counterparty; `participants` lists
/// every well-known party whose vault receives the result, this node
/// included.
pub(crate) async fn propose(
    node: &Node,
    proposal: Proposal,
    mut sessions: Vec<FlowSession>,
    participants: &[Party],
    tracker: &mut ProgressTracker,
) -> Result<CommittedObligation, FlowError> {
    tracker.set(FlowStep::Building);
    let signers = proposal.signers();
    let mut builder = TransactionBuilder::new(node.commit_service().notary_key());
    if let Some(input) = &proposal.input {
        builder = builder.add_input_state(input);
    }
    if let Some(output) = proposal.output {
        builder = builder.add_output_state(output);
    }
    builder = builder.add_command(proposal.command, signers);
    if let Some(window) = proposal.time_window {
        builder = builder.set_time_window(window);
    }
    let wtx = builder.build()?;
    debug!(party = %node.party().name, tx = %wtx.id(), "transaction built");

    tracker.set(FlowStep::Signing);
    let mut stx = node.sign_as_participant(SignedTransaction::new(wtx, Vec::new()))?;
    if let Some(oracle) = &proposal.oracle {
        // Counterparties have seen nothing yet; dropping the sessions on
        // failure is enough.
        let sig = request_oracle_signature(node, &stx, oracle).await?;
        stx = stx.with_signature(sig)?;
    }

    tracker.set(FlowStep::Collecting);
    let stx = match collect_signatures(stx, &mut sessions).await {
        Ok(stx) => stx,
        Err(e) => {
            abort_sessions(&sessions, &e.to_string());
            return Err(e);
        }
    };

    tracker.set(FlowStep::Finalising);
    let committed = finalise(node, stx, participants, &sessions).await?;
    tracker.set(FlowStep::Committed);
    Ok(committed)
}

/// Open one session per counterparty under `protocol`.
pub(crate) fn open_sessions(node: &Node, counterparties: &[Party], protocol: &str) -> Result<Vec<FlowSession>, FlowError> {
    counterparties
        .iter()
        .map(|party| node.initiate(party, protocol).map_err(FlowError::from))
        .collect()
}

/// This node followed by `counterparties`.
pub(crate) fn with_me(node: &Node, counterparties: &[Party]) -> Vec<Party> {
    std::iter::once(node.party().clone())
        .chain(counterparties.iter().cloned())
        .collect()
}

pub(crate) fn ensure_participant(node: &Node, obligation: &Obligation) -> Result<(), FlowError> {
    if obligation.participants().iter().any(|p| node.is_me(p)) {
        Ok(())
    } else {
        Err(FlowError::NotParticipant(node.party().name.clone()))
    }
}

/// Resolve every participant of `states` and open a session to each one
/// that is not this node.
pub(crate) fn counterparty_sessions<'a, I>(
    node: &Node,
    states: I,
    protocol: &str,
) -> Result<(Vec<FlowSession>, Vec<Party>), FlowError>
where
    I: IntoIterator<Item = &'a Obligation>,
{
    let parties: Vec<AbstractParty> = states.into_iter().flat_map(|o| o.participants()).collect();
    let counterparties = node.counterparties(&parties)?;
    let sessions = open_sessions(node, &counterparties, protocol)?;
    Ok((sessions, with_me(node, &counterparties)))
}

// ---------------------------------------------------------------------------
// Counterparty side
// ---------------------------------------------------------------------------

/// Rules one responder applies to the change it is asked to sign, given
/// the input as this node knows it (if at all), the command and the
/// proposed output.
pub(crate) type SuccessorCheck =
    fn(&Node, Option<&StateAndRef<Obligation>>, &ObligationCommand, Option<&Obligation>) -> Result<(), FlowError>;

/// Counter-sign a change to an existing obligation if it passes `successor`.
pub(crate) async fn respond_to_change(
    node: &Node,
    mut session: FlowSession,
    successor: SuccessorCheck,
) -> Result<(), FlowError> {
    sign_and_await_finality(node, &mut session, |stx| check_change(node, stx, successor)).await?;
    Ok(())
}

fn check_change(node: &Node, stx: &ObligationTransaction, successor: SuccessorCheck) -> Result<(), FlowError> {
    let tx = &stx.tx;
    if tx.inputs.len() != 1 || tx.commands.len() != 1 || tx.outputs.len() > 1 {
        return Err(FlowError::protocol(
            "a change needs exactly one input, one command and at most one output",
        ));
    }
    let input_ref = &tx.inputs[0];
    let command = &tx.commands[0].value;
    let output = tx.outputs.first();

    let known = node.vault().state(input_ref);
    if let Some(input) = &known {
        if node.vault().status(input_ref) != Some(StateStatus::Unconsumed) {
            return Err(FlowError::protocol(format!("input {input_ref} is not live here")));
        }
        if output.is_some_and(|o| o.linear_id != input.state.linear_id) {
            return Err(FlowError::protocol("output does not continue the input obligation"));
        }
    }

    if let Some(oracle) = command.as_token_change().and_then(|n| n.oracle()) {
        if !stx.signers().contains(&oracle.owning_key) {
            return Err(FlowError::protocol(format!("token change is not signed by {}", oracle.name)));
        }
    }

    successor(node, known.as_ref(), command, output)
}

/// The standard rule for a node that does not hold the input.
pub(crate) fn unknown_input() -> FlowError {
    FlowError::protocol("input obligation is unknown to this node")
}
