//! Novation command processor.
//!
//! Applies one [`NovationCommand`] to the current obligation and returns the
//! successor together with the command as it will be committed. Only the
//! token change ever talks to anyone: when the command carries no rate, the
//! rate for the obligation's creation time is fetched once and written into
//! the returned command.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use covenant_contracts::{FxRate, FxRateRequest, NovationCommand, Obligation, ObligationError, TokenType};
use covenant_protocol::identity::Party;
use tracing::debug;

use crate::error::FlowError;
use crate::fx_rate::get_fx_rate;
use crate::node::Node;

/// Where the processor gets rates from.
#[async_trait]
pub trait FxRateProvider: Send + Sync {
    async fn fx_rate(&self, request: &FxRateRequest, oracle: &Party) -> Result<FxRate, FlowError>;
}

/// Asks the named oracle over a session.
pub struct OracleRateProvider<'a> {
    node: &'a Node,
}

impl<'a> OracleRateProvider<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }
}

#[async_trait]
impl<'a> FxRateProvider for OracleRateProvider<'a> {
    async fn fx_rate(&self, request: &FxRateRequest, oracle: &Party) -> Result<FxRate, FlowError> {
        get_fx_rate(self.node, request, oracle).await
    }
}

/// The successor of `obligation` under `command`, and the command to commit.
pub async fn handle_novation_command(
    obligation: &Obligation,
    command: NovationCommand,
    rates: &dyn FxRateProvider,
    now: DateTime<Utc>,
) -> Result<(Obligation, NovationCommand), FlowError> {
    let command = resolve_rate(obligation, command, rates).await?;
    let updated = apply_novation(obligation, &command, now)?;
    Ok((updated, command))
}

/// Fill in a missing token-change rate from `rates`. Every other command is
/// returned as given.
async fn resolve_rate(
    obligation: &Obligation,
    command: NovationCommand,
    rates: &dyn FxRateProvider,
) -> Result<NovationCommand, FlowError> {
    match command {
        NovationCommand::UpdateFaceAmountToken {
            old_token,
            new_token,
            oracle,
            fx_rate: None,
        } => {
            require_token(obligation, &old_token)?;
            let request = FxRateRequest::new(old_token.clone(), new_token.clone(), obligation.created_at);
            let rate = rates.fx_rate(&request, &oracle).await?.rate;
            Ok(NovationCommand::UpdateFaceAmountToken {
                old_token,
                new_token,
                oracle,
                fx_rate: Some(rate),
            })
        }
        resolved => Ok(resolved),
    }
}

/// Apply a fully resolved novation. Pure; a token change must already
/// carry its rate.
pub fn apply_novation(
    obligation: &Obligation,
    command: &NovationCommand,
    now: DateTime<Utc>,
) -> Result<Obligation, FlowError> {
    let updated = match command {
        NovationCommand::UpdateFaceAmountQuantity { new_amount } => {
            obligation.with_new_face_value_quantity(new_amount.clone())?
        }
        NovationCommand::UpdateFaceAmountToken {
            old_token,
            new_token,
            fx_rate,
            ..
        } => {
            require_token(obligation, old_token)?;
            let rate = fx_rate.ok_or_else(|| FlowError::protocol("token change carries no rate"))?;
            debug!(%old_token, %new_token, %rate, "converting face amount");
            obligation.with_new_face_value_token(new_token.clone(), rate)?
        }
        NovationCommand::UpdateDueBy { new_due_by } => obligation.with_due_by_date(*new_due_by, now)?,
        NovationCommand::UpdateParty { old_party, new_party } => {
            obligation.with_new_counterparty(old_party, new_party.clone())?
        }
    };
    Ok(updated)
}

fn require_token(obligation: &Obligation, old_token: &TokenType) -> Result<(), ObligationError> {
    if &obligation.face_amount.token != old_token {
        return Err(ObligationError::TokenMismatch {
            expected: obligation.face_amount.token.to_string(),
            actual: old_token.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use covenant_contracts::Amount;
    use covenant_protocol::crypto::Keypair;
    use covenant_protocol::identity::AbstractParty;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    /// Answers every request with `rate` and remembers what it was asked.
    struct Recording {
        rate: Decimal,
        asked: Mutex<Vec<FxRateRequest>>,
    }

    impl Recording {
        fn new(rate: Decimal) -> Self {
            Self {
                rate,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FxRateProvider for Recording {
        async fn fx_rate(&self, request: &FxRateRequest, _oracle: &Party) -> Result<FxRate, FlowError> {
            self.asked.lock().push(request.clone());
            Ok(request.answer(self.rate))
        }
    }

    fn party(name: &str) -> Party {
        Party::new(name, Keypair::generate().public_key())
    }

    fn obligation(units: u64, token: TokenType) -> Obligation {
        let now = Utc::now() - Duration::days(3);
        Obligation::new(
            Amount::of(units, token).unwrap(),
            party("Alice").into(),
            party("Bob").into(),
            None,
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn token_change_fetches_rate_at_creation_time() {
        let current = obligation(10_000, TokenType::USD);
        let rates = Recording::new(Decimal::from(2));
        let oracle = party("Oracle");

        let (updated, command) = handle_novation_command(
            &current,
            NovationCommand::UpdateFaceAmountToken {
                old_token: TokenType::USD,
                new_token: TokenType::EUR,
                oracle: oracle.clone(),
                fx_rate: None,
            },
            &rates,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(updated.face_amount, Amount::of(20_000, TokenType::EUR).unwrap());
        assert_eq!(
            command,
            NovationCommand::UpdateFaceAmountToken {
                old_token: TokenType::USD,
                new_token: TokenType::EUR,
                oracle,
                fx_rate: Some(Decimal::from(2)),
            }
        );
        let asked = rates.asked.lock();
        assert_eq!(asked.len(), 1);
        assert_eq!(asked[0].time, current.created_at);
    }

    #[tokio::test]
    async fn supplied_rate_is_never_re_requested() {
        let current = obligation(100, TokenType::GBP);
        let rates = Recording::new(Decimal::from(99));

        let (updated, _) = handle_novation_command(
            &current,
            NovationCommand::UpdateFaceAmountToken {
                old_token: TokenType::GBP,
                new_token: TokenType::USD,
                oracle: party("Oracle"),
                fx_rate: Some(Decimal::new(125, 2)),
            },
            &rates,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(updated.face_amount, Amount::of(125, TokenType::USD).unwrap());
        assert!(rates.asked.lock().is_empty());
    }

    #[tokio::test]
    async fn token_change_from_the_wrong_token_fails() {
        let current = obligation(100, TokenType::GBP);
        let rates = Recording::new(Decimal::from(2));

        let err = handle_novation_command(
            &current,
            NovationCommand::UpdateFaceAmountToken {
                old_token: TokenType::USD,
                new_token: TokenType::EUR,
                oracle: party("Oracle"),
                fx_rate: None,
            },
            &rates,
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FlowError::Obligation(ObligationError::TokenMismatch { .. })));
        assert!(rates.asked.lock().is_empty());
    }

    #[tokio::test]
    async fn other_variants_return_the_command_unchanged() {
        let current = obligation(100, TokenType::GBP);
        let rates = Recording::new(Decimal::from(2));
        let now = Utc::now();

        let due = NovationCommand::UpdateDueBy {
            new_due_by: now + Duration::days(10),
        };
        let (updated, command) = handle_novation_command(&current, due.clone(), &rates, now)
            .await
            .unwrap();
        assert_eq!(updated.due_by, Some(now + Duration::days(10)));
        assert_eq!(command, due);

        let charlie: AbstractParty = party("Charlie").into();
        let swap = NovationCommand::UpdateParty {
            old_party: current.obligee.clone(),
            new_party: charlie.clone(),
        };
        let (updated, command) = handle_novation_command(&current, swap.clone(), &rates, now)
            .await
            .unwrap();
        assert_eq!(updated.obligee, charlie);
        assert_eq!(command, swap);

        let past = NovationCommand::UpdateDueBy {
            new_due_by: now - Duration::seconds(1),
        };
        assert!(handle_novation_command(&current, past, &rates, now).await.is_err());
        assert!(rates.asked.lock().is_empty());
    }

    #[test]
    fn applying_an_unpriced_token_change_fails() {
        let current = obligation(100, TokenType::GBP);
        let unpriced = NovationCommand::UpdateFaceAmountToken {
            old_token: TokenType::GBP,
            new_token: TokenType::USD,
            oracle: party("Oracle"),
            fx_rate: None,
        };
        assert!(matches!(
            apply_novation(&current, &unpriced, Utc::now()),
            Err(FlowError::Protocol(_))
        ));
    }
}
