use covenant_contracts::ObligationError;
use covenant_protocol::crypto::SignatureError;
use covenant_protocol::identity::IdentityError;
use covenant_protocol::ledger::{CommitError, LedgerError};
use covenant_protocol::session::SessionError;
use thiserror::Error;
use uuid::Uuid;

/// Every way a flow can fail. A flow that returns any of these committed
/// nothing.
#[derive(Debug, Error)]
pub enum FlowError {
    /// No live obligation with this id in the local vault.
    #[error("obligation {0} not found")]
    NotFound(Uuid),

    /// The counterparty's inspection refused to counter-sign.
    #[error("{party} rejected the transaction: {reason}")]
    CounterpartyRejected { party: String, reason: String },

    /// This node's own inspection refused to counter-sign.
    #[error("transaction refused by local inspection: {0}")]
    InspectionFailed(String),

    #[error("oracle {oracle} refused: {reason}")]
    OracleRefused { oracle: String, reason: String },

    /// The oracle answered a different question than the one asked.
    #[error("oracle answered for a different currency pair or time")]
    RateMismatch,

    /// This node holds none of the keys the operation needs.
    #[error("{0} is not a participant of this obligation")]
    NotParticipant(String),

    /// The initiator gave up after the counterparty had signed.
    #[error("flow aborted by initiator: {0}")]
    Aborted(String),

    /// The counterparty sent something the protocol does not allow here.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error(transparent)]
    Obligation(#[from] ObligationError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl FlowError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
