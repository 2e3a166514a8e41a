//! # Cancel
//!
//! Consume a live obligation without a successor. Both sides sign; after
//! commit neither vault holds a live state with that id.

use covenant_contracts::{Obligation, ObligationCommand};
use covenant_protocol::config::PROTOCOL_CANCEL_OBLIGATION;
use covenant_protocol::ledger::StateAndRef;
use covenant_protocol::session::FlowSession;
use tracing::info;
use uuid::Uuid;

use super::common::{counterparty_sessions, ensure_participant, propose, respond_to_change, unknown_input, Proposal};
use crate::error::FlowError;
use crate::node::Node;
use crate::progress::{FlowStep, ProgressTracker};
use crate::CommittedObligation;

#[derive(Clone, Copy, Debug)]
pub struct CancelObligation {
    pub linear_id: Uuid,
}

impl CancelObligation {
    pub fn new(linear_id: Uuid) -> Self {
        Self { linear_id }
    }

    pub async fn run(self, node: &Node) -> Result<CommittedObligation, FlowError> {
        let mut tracker = ProgressTracker::new("cancel");
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
        info!(party = %node.party().name, obligation_id = %self.linear_id, "cancelling obligation");

        let (sessions, participants) = counterparty_sessions(node, [&input.state], PROTOCOL_CANCEL_OBLIGATION)?;
        let proposal = Proposal {
            input: Some(input),
            output: None,
            command: ObligationCommand::Cancel { id: self.linear_id },
            oracle: None,
            time_window: None,
        };
        propose(node, proposal, sessions, &participants, tracker).await
    }
}

pub(crate) async fn respond(node: &Node, session: FlowSession) -> Result<(), FlowError> {
    respond_to_change(node, session, check_successor).await
}

fn check_successor(
    _node: &Node,
    input: Option<&StateAndRef<Obligation>>,
    command: &ObligationCommand,
    output: Option<&Obligation>,
) -> Result<(), FlowError> {
    let ObligationCommand::Cancel { id } = command else {
        return Err(FlowError::protocol(format!("expected Cancel, got {}", command.name())));
    };
    let input = input.ok_or_else(unknown_input)?;
    if output.is_some() {
        return Err(FlowError::protocol("a cancel produces no output"));
    }
    if *id != input.state.linear_id {
        return Err(FlowError::protocol(format!(
            "cancel names {id}, input is {}",
            input.state.linear_id
        )));
    }
    Ok(())
}
