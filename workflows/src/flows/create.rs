//! # Create
//!
//! Issue a new obligation between this node and one counterparty.
//!
//! ```text
//! Initiator → Counterparty: CreateHandshake { anonymous }
//! (anonymous only) confidential identity exchange
//! Initiator → Counterparty: proposal, then finality (see `collect`)
//! ```
//!
//! Everything the model can reject (zero amount, same party, past due
//! date) is rejected before the first message is sent.

use chrono::{DateTime, Utc};
use covenant_contracts::{Amount, Obligation, ObligationCommand, ObligationError};
use covenant_protocol::config::{CREATE_TIME_WINDOW, PROTOCOL_CREATE_OBLIGATION};
use covenant_protocol::identity::{AbstractParty, IdentityService, Party};
use covenant_protocol::ledger::TimeWindow;
use covenant_protocol::session::FlowSession;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::common::{propose, Proposal};
use crate::collect::sign_and_await_finality;
use crate::confidential::{request_confidential_identities, respond_confidential_identities, ConfidentialIdentities};
use crate::error::FlowError;
use crate::node::Node;
use crate::progress::{FlowStep, ProgressTracker};
use crate::{CommittedObligation, ObligationTransaction};

/// Which side of the new obligation the initiator takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Obligor,
    Obligee,
}

#[derive(Clone, Debug)]
pub struct CreateObligation {
    pub amount: Amount,
    pub role: Role,
    pub counterparty: Party,
    pub due_by: Option<DateTime<Utc>>,
    /// Use fresh pseudonyms for both sides instead of legal identities.
    pub anonymous: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateHandshake {
    anonymous: bool,
}

impl CreateObligation {
    pub async fn run(self, node: &Node) -> Result<CommittedObligation, FlowError> {
        let mut tracker = ProgressTracker::new("create");
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
        let me = node.party().clone();
        let (obligor, obligee) = match self.role {
            Role::Obligor => (me.clone(), self.counterparty.clone()),
            Role::Obligee => (self.counterparty.clone(), me.clone()),
        };
        let mut obligation = Obligation::new(self.amount, obligor.into(), obligee.into(), self.due_by, Utc::now())?;

        let mut session = node.initiate(&self.counterparty, PROTOCOL_CREATE_OBLIGATION)?;
        session.send(&CreateHandshake {
            anonymous: self.anonymous,
        })?;
        if self.anonymous {
            let ids = request_confidential_identities(node, &mut session).await?;
            let (obligor, obligee) = match self.role {
                Role::Obligor => (ids.ours, ids.theirs),
                Role::Obligee => (ids.theirs, ids.ours),
            };
            obligation.obligor = obligor.into();
            obligation.obligee = obligee.into();
        }

        info!(
            party = %me.name,
            counterparty = %self.counterparty.name,
            obligation_id = %obligation.linear_id,
            amount = %obligation.face_amount,
            anonymous = self.anonymous,
            "creating obligation"
        );
        let proposal = Proposal {
            input: None,
            output: Some(obligation),
            command: ObligationCommand::Create,
            oracle: None,
            time_window: Some(TimeWindow::from_now(CREATE_TIME_WINDOW)),
        };
        propose(node, proposal, vec![session], &[me, self.counterparty], tracker).await
    }
}

pub(crate) async fn respond(node: &Node, mut session: FlowSession) -> Result<(), FlowError> {
    let handshake: CreateHandshake = session.receive().await?;
    let pseudonyms = if handshake.anonymous {
        Some(respond_confidential_identities(node, &mut session).await?)
    } else {
        None
    };
    let initiator = session.counterparty().clone();
    sign_and_await_finality(node, &mut session, |stx| {
        check_proposal(node, &initiator, pseudonyms.as_ref(), stx)
    })
    .await?;
    Ok(())
}

fn check_proposal(
    node: &Node,
    initiator: &Party,
    pseudonyms: Option<&ConfidentialIdentities>,
    stx: &ObligationTransaction,
) -> Result<(), FlowError> {
    let tx = &stx.tx;
    if !tx.inputs.is_empty() || tx.outputs.len() != 1 || tx.commands.len() != 1 {
        return Err(FlowError::protocol(
            "a create needs no inputs, one output and one command",
        ));
    }
    if tx.commands[0].value != ObligationCommand::Create {
        return Err(FlowError::protocol(format!(
            "expected Create, got {}",
            tx.commands[0].value.name()
        )));
    }

    let obligation = &tx.outputs[0];
    if obligation.face_amount.is_zero() {
        return Err(ObligationError::ZeroAmount.into());
    }
    let (ours, theirs): (&AbstractParty, &AbstractParty) = if node.is_me(&obligation.obligor) {
        (&obligation.obligor, &obligation.obligee)
    } else if node.is_me(&obligation.obligee) {
        (&obligation.obligee, &obligation.obligor)
    } else {
        return Err(FlowError::NotParticipant(node.party().name.clone()));
    };

    match pseudonyms {
        Some(ids) => {
            if ours.owning_key() != ids.ours.owning_key || theirs.owning_key() != ids.theirs.owning_key {
                return Err(FlowError::protocol("obligation does not use the exchanged pseudonyms"));
            }
        }
        None => {
            if ours.is_anonymous() || theirs.is_anonymous() {
                return Err(FlowError::protocol("pseudonyms used without an exchange"));
            }
        }
    }

    let resolved = node.identity().require_well_known_party(theirs)?;
    if resolved.name != initiator.name {
        return Err(FlowError::protocol(format!(
            "other side is {}, session is with {}",
            resolved.name, initiator.name
        )));
    }
    Ok(())
}
