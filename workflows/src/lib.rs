//! # Covenant Workflows
//!
//! The flows that move obligations through their lifecycle, and the
//! services a node runs to take part in them.
//!
//! - [`node`] — the per-party service hub and inbound session dispatcher.
//! - [`flows`] — Create, Novate, Cancel and the settlement/payment updates,
//!   each with its initiator and responder.
//! - [`novation`] — the novation command processor.
//! - [`confidential`] — pseudonym exchange for anonymous obligations.
//! - [`fx_rate`], [`oracle_signature`], [`oracle`] — the FX oracle client
//!   protocols and the oracle service itself.
//! - [`collect`] — counter-signature collection and finality.
//! - [`testing`] — an in-process network of nodes.

pub mod collect;
pub mod confidential;
pub mod error;
pub mod flows;
pub mod fx_rate;
pub mod node;
pub mod novation;
pub mod oracle;
pub mod oracle_signature;
pub mod progress;
pub mod testing;

use covenant_contracts::{Obligation, ObligationCommand};
use covenant_protocol::ledger::{CommittedTransaction, SignedTransaction};

pub use collect::{AcceptAll, TransactionInspector};
pub use error::FlowError;
pub use flows::{
    AddPayment, CancelObligation, CreateObligation, NovateObligation, Role, UpdatePaymentStatus,
    UpdateSettlementMethod,
};
pub use fx_rate::get_fx_rate;
pub use node::{NetworkServices, Node, ObligationGuard};
pub use oracle::{FixedRateSource, IssuedRatePolicy, OracleService, RateSource, SigningPolicy};
pub use progress::{FlowStep, ProgressTracker};
pub use testing::MockNetwork;

/// An obligation transaction with the signatures collected so far.
pub type ObligationTransaction = SignedTransaction<Obligation, ObligationCommand>;

/// An obligation transaction as the commit service accepted it.
pub type CommittedObligation = CommittedTransaction<Obligation, ObligationCommand>;
