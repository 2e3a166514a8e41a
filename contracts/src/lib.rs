//! # Covenant Obligation Contracts
//!
//! The obligation model: what an obligation is, how each kind of change
//! produces its successor, and the commands that name those changes on
//! the ledger.
//!
//! - **Obligation** — the state, with pure `with_*` mutations that validate
//!   as they go.
//! - **Commands** — the obligation command set, with novations as a nested
//!   sum type.
//! - **Tokens** — token types and integer amounts, converted through
//!   `rust_decimal` whenever a rate is involved.
//! - **Payments and settlement** — how the obligee wants to be paid and
//!   what has been paid so far.
//! - **FX** — the request/response pair exchanged with a rate oracle.
//!
//! Nothing in this crate performs I/O.

pub mod commands;
pub mod error;
pub mod fx;
pub mod obligation;
pub mod payment;
pub mod settlement;
pub mod token;

pub use commands::{NovationCommand, ObligationCommand};
pub use error::ObligationError;
pub use fx::{FxRate, FxRateRequest};
pub use obligation::Obligation;
pub use payment::{Payment, PaymentReference, PaymentStatus};
pub use settlement::SettlementMethod;
pub use token::{Amount, TokenType};
