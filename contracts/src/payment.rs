//! Payments made against an obligation through an off-ledger rail.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::token::Amount;

/// Reference issued by the settlement rail.
pub type PaymentReference = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Sent,
    Settled,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "SENT"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub reference: PaymentReference,
    pub amount: Amount,
    pub status: PaymentStatus,
}

impl Payment {
    /// A payment that has just been sent and is awaiting confirmation.
    pub fn sent(reference: impl Into<PaymentReference>, amount: Amount) -> Self {
        Self {
            reference: reference.into(),
            amount,
            status: PaymentStatus::Sent,
        }
    }
}
