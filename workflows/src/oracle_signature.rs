//! Oracle co-signing client.
//!
//! The oracle never sees the whole transaction. It receives a
//! [`FilteredTransaction`] that reveals only the token-change commands it is
//! named on (and their signer lists). It checks the view against the
//! transaction id, applies its policy and signs the id.

use covenant_contracts::{Obligation, ObligationCommand};
use covenant_protocol::config::PROTOCOL_FX_ORACLE_SIGNATURE;
use covenant_protocol::crypto::TransactionSignature;
use covenant_protocol::identity::Party;
use covenant_protocol::ledger::{FilteredTransaction, TxComponent, WireTransaction};
use tracing::debug;

use crate::error::FlowError;
use crate::node::Node;
use crate::oracle::OracleReply;
use crate::ObligationTransaction;

/// The part of `tx` an oracle with key `oracle` may see.
pub fn oracle_view(
    tx: &WireTransaction<Obligation, ObligationCommand>,
    oracle: &Party,
) -> Result<FilteredTransaction, FlowError> {
    let key = oracle.owning_key;
    let ftx = FilteredTransaction::build(tx, |component: TxComponent<'_, Obligation, ObligationCommand>| {
        match component {
            TxComponent::Command(command) => command.requires(&key) && command.value.as_token_change().is_some(),
            _ => false,
        }
    })?;
    Ok(ftx)
}

/// Obtain `oracle`'s signature over `stx`.
pub async fn request_oracle_signature(
    node: &Node,
    stx: &ObligationTransaction,
    oracle: &Party,
) -> Result<TransactionSignature, FlowError> {
    let ftx = oracle_view(&stx.tx, oracle)?;
    debug!(oracle = %oracle.name, revealed = ftx.revealed_count(), "requesting oracle signature");

    let mut session = node.initiate(oracle, PROTOCOL_FX_ORACLE_SIGNATURE)?;
    let reply: OracleReply<TransactionSignature> = session.send_and_receive(&ftx).await?;

    let refused = |reason: String| FlowError::OracleRefused {
        oracle: oracle.name.clone(),
        reason,
    };
    let sig = match reply {
        OracleReply::Ok(sig) => sig,
        OracleReply::Refused(reason) => return Err(refused(reason)),
    };
    if sig.by != oracle.owning_key {
        return Err(refused(format!("signed with {} instead of its legal key", sig.by.short())));
    }
    sig.verify(&stx.id())?;
    Ok(sig)
}
