use chrono::{DateTime, Utc};
use covenant_protocol::crypto::PublicKey;
use covenant_protocol::identity::IdentityError;
use thiserror::Error;

/// Validation failures of the obligation model. All of these are raised
/// before any network interaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObligationError {
    /// Face amounts and payments must be strictly positive.
    #[error("amount must be > 0")]
    ZeroAmount,

    /// Obligor and obligee resolve to the same key.
    #[error("obligor and obligee must differ")]
    SameParty,

    /// A due date must lie strictly after the moment it is set.
    #[error("due date {due_by} is not after {now}")]
    DueDateNotInFuture {
        due_by: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// An amount in one token was supplied where another was required.
    #[error("token mismatch: expected {expected}, got {actual}")]
    TokenMismatch { expected: String, actual: String },

    /// Decimal conversion left the representable range.
    #[error("amount conversion overflowed for token {0}")]
    Overflow(String),

    /// Token precision outside the supported range.
    #[error("fraction digits {0} out of range (max {max})", max = crate::token::MAX_FRACTION_DIGITS)]
    InvalidFractionDigits(u32),

    /// The party being replaced is neither obligor nor obligee.
    #[error("key {0} is not a party to this obligation")]
    NotAParty(PublicKey),

    #[error("payment reference '{0}' is already recorded")]
    DuplicatePayment(String),

    #[error("no payment with reference '{0}'")]
    UnknownPayment(String),

    /// Resolving a pseudonymous participant failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
