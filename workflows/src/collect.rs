//! Counter-signature collection and finality.
//!
//! The initiator sends its signed proposal to every counterparty at once
//! and waits for all of them. Each counterparty verifies what it received,
//! runs the flow-specific check and the node's [`TransactionInspector`],
//! then answers with its signatures or a rejection. After the commit
//! service has answered, the initiator tells every counterparty how it
//! ended.
//!
//! ```text
//! Initiator → Counterparty: SignedTransaction (initiator signed, oracle signed if needed)
//! Counterparty → Initiator: SignatureReply::{Signed | Rejected}
//! Initiator → Counterparty: FinalityNotice::{Committed | Aborted}
//! ```

use covenant_protocol::crypto::{SecureHash, TransactionSignature};
use covenant_protocol::identity::{IdentityService, Party};
use covenant_protocol::session::FlowSession;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::node::Node;
use crate::{CommittedObligation, ObligationTransaction};

/// Policy a node applies before counter-signing anything.
pub trait TransactionInspector: Send + Sync {
    /// `Err(reason)` refuses; the reason is sent to the initiator.
    fn inspect(&self, stx: &ObligationTransaction) -> Result<(), String>;
}

/// Signs everything that passes the protocol checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl TransactionInspector for AcceptAll {
    fn inspect(&self, _stx: &ObligationTransaction) -> Result<(), String> {
        Ok(())
    }
}

impl<F> TransactionInspector for F
where
    F: Fn(&ObligationTransaction) -> Result<(), String> + Send + Sync,
{
    fn inspect(&self, stx: &ObligationTransaction) -> Result<(), String> {
        self(stx)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub enum SignatureReply {
    Signed(Vec<TransactionSignature>),
    Rejected(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub enum FinalityNotice {
    Committed(SecureHash),
    Aborted(String),
}

// ---------------------------------------------------------------------------
// Initiator side
// ---------------------------------------------------------------------------

/// Send `stx` to every session and attach whatever comes back. Fails on the
/// first rejection. The result carries every required signature.
pub(crate) async fn collect_signatures(
    stx: ObligationTransaction,
    sessions: &mut [FlowSession],
) -> Result<ObligationTransaction, FlowError> {
    let required = stx.required_signers();
    let requests = sessions.iter_mut().map(|session| {
        let stx = &stx;
        async move {
            let reply: SignatureReply = session.send_and_receive(stx).await?;
            let party = session.counterparty().name.clone();
            match reply {
                SignatureReply::Signed(sigs) => {
                    debug!(%party, count = sigs.len(), "counter-signatures received");
                    Ok(sigs)
                }
                SignatureReply::Rejected(reason) => {
                    warn!(%party, %reason, "counterparty rejected transaction");
                    Err(FlowError::CounterpartyRejected { party, reason })
                }
            }
        }
    });
    let replies = try_join_all(requests).await?;

    let sigs: Vec<TransactionSignature> = replies.into_iter().flatten().collect();
    if let Some(stray) = sigs.iter().find(|s| !required.contains(&s.by)) {
        return Err(FlowError::protocol(format!(
            "signature by {} is not required",
            stray.by.short()
        )));
    }
    let stx = stx.with_signatures(sigs)?;
    stx.verify_required_signatures()?;
    Ok(stx)
}

/// Submit `stx` for commit and tell every session how it went.
pub(crate) async fn finalise(
    node: &Node,
    stx: ObligationTransaction,
    participants: &[Party],
    sessions: &[FlowSession],
) -> Result<CommittedObligation, FlowError> {
    match node.commit_service().submit(stx, participants).await {
        Ok(committed) => {
            info!(party = %node.party().name, tx = %committed.id(), "transaction committed");
            notify(sessions, &FinalityNotice::Committed(committed.id()));
            Ok(committed)
        }
        Err(e) => {
            warn!(party = %node.party().name, error = %e, "commit failed");
            notify(sessions, &FinalityNotice::Aborted(e.to_string()));
            Err(e.into())
        }
    }
}

/// Tell counterparties that already signed that nothing will be committed.
pub(crate) fn abort_sessions(sessions: &[FlowSession], reason: &str) {
    notify(sessions, &FinalityNotice::Aborted(reason.to_string()));
}

fn notify(sessions: &[FlowSession], notice: &FinalityNotice) {
    for session in sessions {
        if let Err(e) = session.send(notice) {
            debug!(party = %session.counterparty().name, error = %e, "finality notice not delivered");
        }
    }
}

// ---------------------------------------------------------------------------
// Counterparty side
// ---------------------------------------------------------------------------

/// Receive a proposal, vet it, answer, and wait for the outcome. `check`
/// holds the flow-specific rules. Returns the committed transaction id.
pub(crate) async fn sign_and_await_finality<F>(
    node: &Node,
    session: &mut FlowSession,
    check: F,
) -> Result<SecureHash, FlowError>
where
    F: FnOnce(&ObligationTransaction) -> Result<(), FlowError>,
{
    let stx: ObligationTransaction = session.receive().await?;
    let tx_id = stx.id();

    match vet(node, session.counterparty(), &stx, check) {
        Ok(sigs) => session.send(&SignatureReply::Signed(sigs))?,
        Err(e) => {
            warn!(party = %node.party().name, tx = %tx_id, error = %e, "refusing to sign");
            if let Err(send_err) = session.send(&SignatureReply::Rejected(e.to_string())) {
                debug!(error = %send_err, "rejection not delivered");
            }
            return Err(e);
        }
    }

    match session.receive::<FinalityNotice>().await? {
        FinalityNotice::Committed(id) if id == tx_id => {
            info!(party = %node.party().name, tx = %id, "counter-signed transaction committed");
            Ok(id)
        }
        FinalityNotice::Committed(other) => Err(FlowError::protocol(format!(
            "finality notice for {other}, signed {tx_id}"
        ))),
        FinalityNotice::Aborted(reason) => Err(FlowError::Aborted(reason)),
    }
}

fn vet<F>(
    node: &Node,
    initiator: &Party,
    stx: &ObligationTransaction,
    check: F,
) -> Result<Vec<TransactionSignature>, FlowError>
where
    F: FnOnce(&ObligationTransaction) -> Result<(), FlowError>,
{
    stx.verify_signatures_except(&stx.missing_signers())?;

    let signed_by_initiator = stx.sigs.iter().any(|sig| {
        node.identity()
            .party_from_key(&sig.by)
            .is_some_and(|p| p.name == initiator.name)
    });
    if !signed_by_initiator {
        return Err(FlowError::protocol(format!("not signed by {}", initiator.name)));
    }

    check(stx)?;
    node.inspector()
        .inspect(stx)
        .map_err(FlowError::InspectionFailed)?;
    node.my_signatures(stx)
}
