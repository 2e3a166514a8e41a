//! # Novate
//!
//! Replace a live obligation with its successor under one
//! [`NovationCommand`]. A token change is priced by the named oracle (unless
//! the command already carries a rate), and the oracle co-signs the
//! filtered transaction before any counterparty sees it.
//!
//! Signatures are collected from every well-known participant of the old
//! and the new obligation, so an `UpdateParty` brings in the incoming party.

use chrono::Utc;
use covenant_contracts::{NovationCommand, Obligation, ObligationCommand};
use covenant_protocol::config::PROTOCOL_NOVATE_OBLIGATION;
use covenant_protocol::ledger::{ContractState, StateAndRef};
use covenant_protocol::session::FlowSession;
use tracing::info;
use uuid::Uuid;

use super::common::{counterparty_sessions, ensure_participant, propose, respond_to_change, unknown_input, Proposal};
use crate::error::FlowError;
use crate::node::Node;
use crate::novation::{apply_novation, handle_novation_command, OracleRateProvider};
use crate::progress::{FlowStep, ProgressTracker};
use crate::CommittedObligation;

#[derive(Clone, Debug)]
pub struct NovateObligation {
    pub linear_id: Uuid,
    pub command: NovationCommand,
}

impl NovateObligation {
    pub fn new(linear_id: Uuid, command: NovationCommand) -> Self {
        Self { linear_id, command }
    }

    pub async fn run(self, node: &Node) -> Result<CommittedObligation, FlowError> {
        let mut tracker = ProgressTracker::new("novate");
        self.run_tracked(node, &mut tracker).await
    }

    pub async fn run_tracked(
        self,
        node: &Node,
        tracker: &mut ProgressTracker,
    ) -> Result<CommittedObligation, FlowError> {
        let result = self.execute(node, tracker).await;
        if let Err(e) = &result {
            tracker.abort(e);
        }
        result
    }

    async fn execute(self, node: &Node, tracker: &mut ProgressTracker) -> Result<CommittedObligation, FlowError> {
        tracker.set(FlowStep::Initialising);
        let _guard = node.lock_obligation(self.linear_id).await;
        let input = node.live_obligation(self.linear_id)?;
        ensure_participant(node, &input.state)?;

        tracker.set(FlowStep::Handling);
        let rates = OracleRateProvider::new(node);
        let (output, command) = handle_novation_command(&input.state, self.command, &rates, Utc::now()).await?;
        info!(
            party = %node.party().name,
            obligation_id = %self.linear_id,
            command = command.name(),
            amount = %output.face_amount,
            "novating obligation"
        );

        let (sessions, participants) =
            counterparty_sessions(node, [&input.state, &output], PROTOCOL_NOVATE_OBLIGATION)?;
        let proposal = Proposal {
            input: Some(input),
            output: Some(output),
            oracle: command.oracle().cloned(),
            command: ObligationCommand::Novate(command),
            time_window: None,
        };
        propose(node, proposal, sessions, &participants, tracker).await
    }
}

pub(crate) async fn respond(node: &Node, session: FlowSession) -> Result<(), FlowError> {
    respond_to_change(node, session, check_successor).await
}

fn check_successor(
    node: &Node,
    input: Option<&StateAndRef<Obligation>>,
    command: &ObligationCommand,
    output: Option<&Obligation>,
) -> Result<(), FlowError> {
    let ObligationCommand::Novate(novation) = command else {
        return Err(FlowError::protocol(format!("expected a novation, got {}", command.name())));
    };
    let output = output.ok_or_else(|| FlowError::protocol("a novation needs an output"))?;

    match input {
        Some(input) => {
            let expected = apply_novation(&input.state, novation, Utc::now())?;
            if &expected != output {
                return Err(FlowError::protocol(format!(
                    "output is not the result of {}",
                    novation.name()
                )));
            }
            Ok(())
        }
        // Only the incoming party of an UpdateParty signs without holding
        // the input.
        None => match novation {
            NovationCommand::UpdateParty { new_party, .. }
                if node.is_me(new_party) && output.participants().iter().any(|p| node.is_me(p)) =>
            {
                Ok(())
            }
            _ => Err(unknown_input()),
        },
    }
}
