//! How an obligee wants to be paid.

use covenant_protocol::crypto::PublicKey;
use serde::{Deserialize, Serialize};

use crate::token::TokenType;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementMethod {
    /// Payment in on-ledger tokens to a key.
    OnLedger {
        account_to_pay: PublicKey,
        acceptable_tokens: Vec<TokenType>,
    },
    /// Payment over an external rail (bank transfer, card network, ...).
    OffLedger { account_to_pay: String, rail: String },
}

impl SettlementMethod {
    /// Destination of payments, rendered for display.
    pub fn account_to_pay(&self) -> String {
        match self {
            Self::OnLedger { account_to_pay, .. } => account_to_pay.to_base58(),
            Self::OffLedger { account_to_pay, .. } => account_to_pay.clone(),
        }
    }

    /// Off-ledger rails accept whatever the rail carries.
    pub fn accepts(&self, token: &TokenType) -> bool {
        match self {
            Self::OnLedger { acceptable_tokens, .. } => acceptable_tokens.contains(token),
            Self::OffLedger { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_protocol::crypto::Keypair;

    #[test]
    fn on_ledger_accepts_only_listed_tokens() {
        let method = SettlementMethod::OnLedger {
            account_to_pay: Keypair::generate().public_key(),
            acceptable_tokens: vec![TokenType::GBP],
        };
        assert!(method.accepts(&TokenType::GBP));
        assert!(!method.accepts(&TokenType::USD));
    }

    #[test]
    fn off_ledger_reports_account() {
        let method = SettlementMethod::OffLedger {
            account_to_pay: "GB29 NWBK 6016 1331 9268 19".into(),
            rail: "FPS".into(),
        };
        assert_eq!(method.account_to_pay(), "GB29 NWBK 6016 1331 9268 19");
        assert!(method.accepts(&TokenType::JPY));
    }
}
