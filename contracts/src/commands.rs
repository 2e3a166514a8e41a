//! Obligation commands.
//!
//! Exactly one [`ObligationCommand`] drives each obligation transaction.
//! Novations are a nested sum type so that the processor can match on
//! them exhaustively.

use chrono::{DateTime, Utc};
use covenant_protocol::identity::{AbstractParty, Party};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payment::PaymentReference;
use crate::token::{Amount, TokenType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NovationCommand {
    UpdateFaceAmountQuantity {
        new_amount: Amount,
    },
    /// `fx_rate` may be left empty by the caller; the processor fills it
    /// before the command goes into a transaction.
    UpdateFaceAmountToken {
        old_token: TokenType,
        new_token: TokenType,
        oracle: Party,
        #[serde(with = "crate::fx::optional_rate")]
        fx_rate: Option<Decimal>,
    },
    UpdateDueBy {
        new_due_by: DateTime<Utc>,
    },
    UpdateParty {
        old_party: AbstractParty,
        new_party: AbstractParty,
    },
}

impl NovationCommand {
    /// The oracle that must co-sign, for token changes.
    pub fn oracle(&self) -> Option<&Party> {
        match self {
            Self::UpdateFaceAmountToken { oracle, .. } => Some(oracle),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateFaceAmountQuantity { .. } => "UpdateFaceAmountQuantity",
            Self::UpdateFaceAmountToken { .. } => "UpdateFaceAmountToken",
            Self::UpdateDueBy { .. } => "UpdateDueBy",
            Self::UpdateParty { .. } => "UpdateParty",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationCommand {
    Create,
    Novate(NovationCommand),
    UpdateSettlementMethod,
    AddPayment { reference: PaymentReference },
    UpdatePayment { reference: PaymentReference },
    Cancel { id: Uuid },
}

impl ObligationCommand {
    /// The token-change novation inside this command, if that is what it is.
    pub fn as_token_change(&self) -> Option<&NovationCommand> {
        match self {
            Self::Novate(n @ NovationCommand::UpdateFaceAmountToken { .. }) => Some(n),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Novate(n) => n.name(),
            Self::UpdateSettlementMethod => "UpdateSettlementMethod",
            Self::AddPayment { .. } => "AddPayment",
            Self::UpdatePayment { .. } => "UpdatePayment",
            Self::Cancel { .. } => "Cancel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_protocol::crypto::Keypair;

    #[test]
    fn token_change_is_recognised_only_for_novations() {
        let oracle = Party::new("Oracle", Keypair::generate().public_key());
        let change = ObligationCommand::Novate(NovationCommand::UpdateFaceAmountToken {
            old_token: TokenType::USD,
            new_token: TokenType::EUR,
            oracle: oracle.clone(),
            fx_rate: None,
        });
        assert_eq!(change.as_token_change().and_then(|n| n.oracle()), Some(&oracle));
        assert!(ObligationCommand::Create.as_token_change().is_none());
        assert!(ObligationCommand::Novate(NovationCommand::UpdateDueBy { new_due_by: Utc::now() })
            .as_token_change()
            .is_none());
    }

    #[test]
    fn resolved_rate_survives_the_wire() {
        let oracle = Party::new("Oracle", Keypair::generate().public_key());
        let command = ObligationCommand::Novate(NovationCommand::UpdateFaceAmountToken {
            old_token: TokenType::USD,
            new_token: TokenType::XRP,
            oracle,
            fx_rate: Some(Decimal::new(12345, 4)),
        });
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("\"1.2345\""));
        let back: ObligationCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn priced_token_change_survives_the_canonical_encoding() {
        let oracle = Party::new("Oracle", Keypair::generate().public_key());
        for fx_rate in [Some(Decimal::from(2)), Some(Decimal::new(92, 2)), None] {
            let command = ObligationCommand::Novate(NovationCommand::UpdateFaceAmountToken {
                old_token: TokenType::USD,
                new_token: TokenType::EUR,
                oracle: oracle.clone(),
                fx_rate,
            });
            let bytes = bincode::serialize(&command).unwrap();
            let back: ObligationCommand = bincode::deserialize(&bytes).unwrap();
            assert_eq!(back, command);
        }
    }

    #[test]
    fn malformed_rate_is_rejected() {
        let oracle = Party::new("Oracle", Keypair::generate().public_key());
        let command = ObligationCommand::Novate(NovationCommand::UpdateFaceAmountToken {
            old_token: TokenType::USD,
            new_token: TokenType::EUR,
            oracle,
            fx_rate: Some(Decimal::ONE),
        });
        let json = serde_json::to_string(&command).unwrap().replace("\"fx_rate\":\"1\"", "\"fx_rate\":\"one\"");
        assert!(serde_json::from_str::<ObligationCommand>(&json).is_err());
    }
}
