//! # Settlement and payment updates
//!
//! Changes that do not alter what is owed: the settlement method, and the
//! payments recorded against the obligation. They run the same two-party
//! pipeline as Cancel, under one session protocol.

use covenant_contracts::{Obligation, ObligationCommand, Payment, PaymentReference, PaymentStatus, SettlementMethod};
use covenant_protocol::config::PROTOCOL_UPDATE_OBLIGATION;
use covenant_protocol::ledger::StateAndRef;
use covenant_protocol::session::FlowSession;
use tracing::info;
use uuid::Uuid;

use super::common::{counterparty_sessions, ensure_participant, propose, respond_to_change, unknown_input, Proposal};
use crate::error::FlowError;
use crate::node::Node;
use crate::progress::{FlowStep, ProgressTracker};
use crate::CommittedObligation;

#[derive(Clone, Debug)]
pub struct UpdateSettlementMethod {
    pub linear_id: Uuid,
    /// `None` clears the method.
    pub settlement_method: Option<SettlementMethod>,
}

#[derive(Clone, Debug)]
pub struct AddPayment {
    pub linear_id: Uuid,
    pub payment: Payment,
}

#[derive(Clone, Debug)]
pub struct UpdatePaymentStatus {
    pub linear_id: Uuid,
    pub reference: PaymentReference,
    pub status: PaymentStatus,
}

impl UpdateSettlementMethod {
    pub async fn run(self, node: &Node) -> Result<CommittedObligation, FlowError> {
        let method = self.settlement_method;
        run_update(node, "update-settlement", self.linear_id, move |current| {
            Ok((current.with_settlement_method(method), ObligationCommand::UpdateSettlementMethod))
        })
        .await
    }
}

impl AddPayment {
    pub async fn run(self, node: &Node) -> Result<CommittedObligation, FlowError> {
        let payment = self.payment;
        run_update(node, "add-payment", self.linear_id, move |current| {
            let reference = payment.reference.clone();
            Ok((current.with_payment(payment)?, ObligationCommand::AddPayment { reference }))
        })
        .await
    }
}

impl UpdatePaymentStatus {
    pub async fn run(self, node: &Node) -> Result<CommittedObligation, FlowError> {
        let (reference, status) = (self.reference, self.status);
        run_update(node, "update-payment", self.linear_id, move |current| {
            let updated = current.with_payment_status(&reference, status)?;
            Ok((updated, ObligationCommand::UpdatePayment { reference }))
        })
        .await
    }
}

async fn run_update<F>(
    node: &Node,
    flow: &'static str,
    linear_id: Uuid,
    change: F,
) -> Result<CommittedObligation, FlowError>
where
    F: FnOnce(&Obligation) -> Result<(Obligation, ObligationCommand), FlowError> + Send,
{
    let mut tracker = ProgressTracker::new(flow);
    let result = execute(node, linear_id, change, &mut tracker).await;
    if let Err(e) = &result {
        tracker.abort(e);
    }
    result
}

async fn execute<F>(
    node: &Node,
    linear_id: Uuid,
    change: F,
    tracker: &mut ProgressTracker,
) -> Result<CommittedObligation, FlowError>
where
    F: FnOnce(&Obligation) -> Result<(Obligation, ObligationCommand), FlowError> + Send,
{
    tracker.set(FlowStep::Initialising);
    let _guard = node.lock_obligation(linear_id).await;
    let input = node.live_obligation(linear_id)?;
    ensure_participant(node, &input.state)?;

    let (output, command) = change(&input.state)?;
    info!(
        party = %node.party().name,
        obligation_id = %linear_id,
        command = command.name(),
        "updating obligation"
    );

    let (sessions, participants) =
        counterparty_sessions(node, [&input.state, &output], PROTOCOL_UPDATE_OBLIGATION)?;
    let proposal = Proposal {
        input: Some(input),
        output: Some(output),
        command,
        oracle: None,
        time_window: None,
    };
    propose(node, proposal, sessions, &participants, tracker).await
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
    let input = &input.ok_or_else(unknown_input)?.state;
    let output = output.ok_or_else(|| FlowError::protocol("an update needs an output"))?;
    let recorded = |reference: &str| {
        output
            .payment(reference)
            .ok_or_else(|| FlowError::protocol(format!("output has no payment '{reference}'")))
    };

    let expected = match command {
        ObligationCommand::UpdateSettlementMethod => input.with_settlement_method(output.settlement_method.clone()),
        ObligationCommand::AddPayment { reference } => input.with_payment(recorded(reference)?.clone())?,
        ObligationCommand::UpdatePayment { reference } => {
            input.with_payment_status(reference, recorded(reference)?.status)?
        }
        other => {
            return Err(FlowError::protocol(format!("{} is not an update", other.name())));
        }
    };
    if &expected != output {
        return Err(FlowError::protocol(format!(
            "output is not the result of {}",
            command.name()
        )));
    }
    Ok(())
}
