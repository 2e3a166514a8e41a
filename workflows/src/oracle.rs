//! # FX Rate Oracle
//!
//! The oracle node answers two protocols:
//!
//! - **Rate requests** — look the pair up in a [`RateSource`], log the
//!   quote, answer with exactly the requested pair and time.
//! - **Signature requests** — receive a [`FilteredTransaction`], check it
//!   against its id, prove every command naming this oracle is visible, let
//!   the [`SigningPolicy`] judge those commands, and sign the id.
//!
//! The default policy, [`IssuedRatePolicy`], only signs a token change that
//! carries a rate this oracle actually quoted for that pair.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use covenant_contracts::{FxRate, FxRateRequest, NovationCommand, ObligationCommand, TokenType};
use covenant_protocol::identity::Party;
use covenant_protocol::ledger::{Command, FilteredTransaction};
use covenant_protocol::session::FlowSession;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::FlowError;
use crate::node::Node;

/// An oracle's answer: the thing asked for, or why not.
#[derive(Debug, Serialize, Deserialize)]
pub enum OracleReply<T> {
    Ok(T),
    Refused(String),
}

// ---------------------------------------------------------------------------
// Rate sources
// ---------------------------------------------------------------------------

pub trait RateSource: Send + Sync {
    /// Units of `counter` per unit of `base` at `time`, if known.
    fn rate(&self, base: &TokenType, counter: &TokenType, time: DateTime<Utc>) -> Option<Decimal>;
}

/// A fixed table of rates, ignoring time. Pairs not in the table fall back
/// to the uniform rate, if one is set.
#[derive(Clone, Debug, Default)]
pub struct FixedRateSource {
    rates: HashMap<(String, String), Decimal>,
    uniform: Option<Decimal>,
}

impl FixedRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote `rate` for every pair.
    pub fn uniform(rate: Decimal) -> Self {
        Self {
            rates: HashMap::new(),
            uniform: Some(rate),
        }
    }

    pub fn with_rate(mut self, base: &TokenType, counter: &TokenType, rate: Decimal) -> Self {
        self.rates
            .insert((base.code.to_string(), counter.code.to_string()), rate);
        self
    }
}

impl RateSource for FixedRateSource {
    fn rate(&self, base: &TokenType, counter: &TokenType, _time: DateTime<Utc>) -> Option<Decimal> {
        self.rates
            .get(&(base.code.to_string(), counter.code.to_string()))
            .copied()
            .or(self.uniform)
    }
}

// ---------------------------------------------------------------------------
// Quote log
// ---------------------------------------------------------------------------

/// Every rate this oracle has issued.
#[derive(Debug, Default)]
pub struct QuoteLog {
    quotes: RwLock<Vec<FxRate>>,
}

impl QuoteLog {
    pub fn record(&self, quote: FxRate) {
        self.quotes.write().push(quote);
    }

    /// Whether `rate` was ever quoted for `base` → `counter`.
    pub fn issued(&self, base: &TokenType, counter: &TokenType, rate: Decimal) -> bool {
        self.quotes
            .read()
            .iter()
            .any(|q| &q.base_currency == base && &q.counter_currency == counter && q.rate == rate)
    }

    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Signing policy
// ---------------------------------------------------------------------------

pub trait SigningPolicy: Send + Sync {
    /// Judge the commands revealed to `oracle`. `Err(reason)` refuses.
    fn approve(
        &self,
        oracle: &Party,
        commands: &[Command<ObligationCommand>],
        quotes: &QuoteLog,
    ) -> Result<(), String>;
}

/// Sign only token changes that name this oracle and carry a rate it
/// issued for that pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct IssuedRatePolicy;

impl SigningPolicy for IssuedRatePolicy {
    fn approve(
        &self,
        oracle: &Party,
        commands: &[Command<ObligationCommand>],
        quotes: &QuoteLog,
    ) -> Result<(), String> {
        if commands.is_empty() {
            return Err("no command to sign".into());
        }
        for command in commands {
            if !command.requires(&oracle.owning_key) {
                return Err(format!("{} does not require this oracle", command.value.name()));
            }
            let Some(NovationCommand::UpdateFaceAmountToken {
                old_token,
                new_token,
                oracle: named,
                fx_rate,
            }) = command.value.as_token_change()
            else {
                return Err(format!("{} is not a token change", command.value.name()));
            };
            if named != oracle {
                return Err(format!("command names oracle {}", named.name));
            }
            let rate = (*fx_rate).ok_or_else(|| "token change carries no rate".to_string())?;
            if !quotes.issued(old_token, new_token, rate) {
                return Err(format!("rate {rate} for {old_token}/{new_token} was never issued"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Oracle service
// ---------------------------------------------------------------------------

pub struct OracleService {
    source: Box<dyn RateSource>,
    policy: Box<dyn SigningPolicy>,
    quotes: QuoteLog,
}

impl OracleService {
    pub fn new(source: impl RateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            policy: Box::new(IssuedRatePolicy),
            quotes: QuoteLog::default(),
        }
    }

    pub fn with_policy(mut self, policy: impl SigningPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn quotes(&self) -> &QuoteLog {
        &self.quotes
    }

    /// Answer `request` and log the quote.
    pub fn quote(&self, request: &FxRateRequest) -> Result<FxRate, String> {
        let rate = self
            .source
            .rate(&request.base_currency, &request.counter_currency, request.time)
            .ok_or_else(|| {
                format!(
                    "no rate for {}/{} at {}",
                    request.base_currency, request.counter_currency, request.time
                )
            })?;
        let answer = request.answer(rate);
        self.quotes.record(answer.clone());
        Ok(answer)
    }

    /// Decide whether `oracle` may sign the transaction behind `ftx`.
    pub fn check_view(&self, oracle: &Party, ftx: &FilteredTransaction) -> Result<(), String> {
        ftx.verify().map_err(|e| e.to_string())?;
        ftx.check_command_visibility(&oracle.owning_key)
            .map_err(|e| e.to_string())?;
        let commands: Vec<Command<ObligationCommand>> = ftx.commands().map_err(|e| e.to_string())?;
        self.policy.approve(oracle, &commands, &self.quotes)
    }
}

// ---------------------------------------------------------------------------
// Responders
// ---------------------------------------------------------------------------

pub(crate) async fn respond_fx_rate(node: &Node, mut session: FlowSession) -> Result<(), FlowError> {
    let request: FxRateRequest = session.receive().await?;
    let from = session.counterparty().name.clone();

    let reply = match node.oracle() {
        None => OracleReply::Refused(format!("{} is not an oracle", node.party().name)),
        Some(oracle) => match oracle.quote(&request) {
            Ok(rate) => {
                info!(
                    oracle = %node.party().name,
                    %from,
                    base = %rate.base_currency,
                    counter = %rate.counter_currency,
                    rate = %rate.rate,
                    "quoted fx rate"
                );
                OracleReply::Ok(rate)
            }
            Err(reason) => {
                warn!(oracle = %node.party().name, %from, %reason, "no quote");
                OracleReply::Refused(reason)
            }
        },
    };
    session.send(&reply)?;
    Ok(())
}

pub(crate) async fn respond_signature(node: &Node, mut session: FlowSession) -> Result<(), FlowError> {
    let ftx: FilteredTransaction = session.receive().await?;
    let from = session.counterparty().name.clone();

    let verdict = match node.oracle() {
        None => Err(format!("{} is not an oracle", node.party().name)),
        Some(oracle) => oracle.check_view(node.party(), &ftx),
    };
    let reply = match verdict {
        Ok(()) => {
            let sig = node.keys().sign(&ftx.id, &node.keys().legal_key())?;
            info!(oracle = %node.party().name, %from, tx = %ftx.id, "signed filtered transaction");
            OracleReply::Ok(sig)
        }
        Err(reason) => {
            warn!(oracle = %node.party().name, %from, tx = %ftx.id, %reason, "refused to sign");
            OracleReply::Refused(reason)
        }
    };
    session.send(&reply)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_protocol::crypto::Keypair;

    fn oracle_party() -> Party {
        Party::new("Oracle", Keypair::generate().public_key())
    }

    fn token_change(oracle: &Party, rate: Option<Decimal>) -> Command<ObligationCommand> {
        Command::new(
            ObligationCommand::Novate(NovationCommand::UpdateFaceAmountToken {
                old_token: TokenType::USD,
                new_token: TokenType::EUR,
                oracle: oracle.clone(),
                fx_rate: rate,
            }),
            [oracle.owning_key],
        )
    }

    #[test]
    fn fixed_source_prefers_table_over_uniform() {
        let source = FixedRateSource::uniform(Decimal::from(2)).with_rate(
            &TokenType::USD,
            &TokenType::JPY,
            Decimal::from(150),
        );
        let now = Utc::now();
        assert_eq!(source.rate(&TokenType::USD, &TokenType::JPY, now), Some(Decimal::from(150)));
        assert_eq!(source.rate(&TokenType::USD, &TokenType::EUR, now), Some(Decimal::from(2)));
        assert_eq!(FixedRateSource::new().rate(&TokenType::USD, &TokenType::EUR, now), None);
    }

    #[test]
    fn quote_answers_exactly_the_request_and_logs_it() {
        let service = OracleService::new(FixedRateSource::uniform(Decimal::new(9, 1)));
        let request = FxRateRequest::new(TokenType::GBP, TokenType::USD, Utc::now());
        let answer = service.quote(&request).unwrap();

        assert!(request.is_answered_by(&answer));
        assert_eq!(service.quotes().len(), 1);
        assert!(service.quotes().issued(&TokenType::GBP, &TokenType::USD, Decimal::new(9, 1)));
        assert!(!service.quotes().issued(&TokenType::USD, &TokenType::GBP, Decimal::new(9, 1)));
    }

    #[test]
    fn unknown_pair_is_refused() {
        let service = OracleService::new(FixedRateSource::new());
        let request = FxRateRequest::new(TokenType::GBP, TokenType::USD, Utc::now());
        assert!(service.quote(&request).is_err());
        assert!(service.quotes().is_empty());
    }

    #[test]
    fn policy_requires_an_issued_rate() {
        let oracle = oracle_party();
        let quotes = QuoteLog::default();
        let policy = IssuedRatePolicy;
        let command = token_change(&oracle, Some(Decimal::from(2)));

        assert!(policy.approve(&oracle, &[command.clone()], &quotes).is_err());

        quotes.record(FxRateRequest::new(TokenType::USD, TokenType::EUR, Utc::now()).answer(Decimal::from(2)));
        assert!(policy.approve(&oracle, &[command], &quotes).is_ok());
    }

    #[test]
    fn policy_refuses_other_commands_and_other_oracles() {
        let oracle = oracle_party();
        let quotes = QuoteLog::default();
        quotes.record(FxRateRequest::new(TokenType::USD, TokenType::EUR, Utc::now()).answer(Decimal::from(2)));

        let other = oracle_party();
        let for_other = token_change(&other, Some(Decimal::from(2)));
        assert!(IssuedRatePolicy.approve(&oracle, &[for_other], &quotes).is_err());

        let unpriced = token_change(&oracle, None);
        assert!(IssuedRatePolicy.approve(&oracle, &[unpriced], &quotes).is_err());

        let create = Command::new(ObligationCommand::Create, [oracle.owning_key]);
        assert!(IssuedRatePolicy.approve(&oracle, &[create], &quotes).is_err());

        assert!(IssuedRatePolicy.approve(&oracle, &[], &quotes).is_err());
    }
}
