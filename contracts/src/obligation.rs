//! # Obligation State
//!
//! An obligation records that the obligor owes the obligee a face amount,
//! optionally by a due date, optionally payable in a particular way, with
//! the payments made against it so far.
//!
//! ## Mutation discipline
//!
//! Every `with_*` method takes `&self` and returns a new value. The ledger
//! replaces the whole state on every change (the old version is consumed,
//! the new one produced), so nothing here ever mutates in place.
//!
//! ## Invariants
//!
//! Enforced by every constructor and `with_*` method:
//!
//! - the face amount is strictly positive;
//! - obligor and obligee have different owning keys;
//! - a due date, when set, is strictly after the instant it is set;
//! - payment references are unique and payments are in the face token.

use chrono::{DateTime, Utc};
use covenant_protocol::identity::{AbstractParty, IdentityService};
use covenant_protocol::ledger::{ContractState, LinearState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ObligationError;
use crate::payment::{Payment, PaymentStatus};
use crate::settlement::SettlementMethod;
use crate::token::{Amount, TokenType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub linear_id: Uuid,
    pub face_amount: Amount,
    pub obligor: AbstractParty,
    pub obligee: AbstractParty,
    pub due_by: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub settlement_method: Option<SettlementMethod>,
    pub payments: Vec<Payment>,
}

impl Obligation {
    /// A new obligation with a fresh id, created at `now`.
    pub fn new(
        face_amount: Amount,
        obligor: AbstractParty,
        obligee: AbstractParty,
        due_by: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, ObligationError> {
        if face_amount.is_zero() {
            return Err(ObligationError::ZeroAmount);
        }
        if obligor.same_as(&obligee) {
            return Err(ObligationError::SameParty);
        }
        if let Some(due_by) = due_by {
            require_future(due_by, now)?;
        }
        Ok(Self {
            linear_id: Uuid::new_v4(),
            face_amount,
            obligor,
            obligee,
            due_by,
            created_at: now,
            settlement_method: None,
            payments: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Novations
    // -----------------------------------------------------------------------

    /// Same token, new quantity.
    pub fn with_new_face_value_quantity(&self, new_amount: Amount) -> Result<Self, ObligationError> {
        self.face_amount.require_same_token(&new_amount)?;
        if new_amount.is_zero() {
            return Err(ObligationError::ZeroAmount);
        }
        Ok(Self {
            face_amount: new_amount,
            ..self.clone()
        })
    }

    /// Convert the face amount into `new_token` at `rate` (units of
    /// `new_token` per unit of the current token), truncated to the new
    /// token's precision.
    pub fn with_new_face_value_token(&self, new_token: TokenType, rate: Decimal) -> Result<Self, ObligationError> {
        let current = self.face_amount.to_decimal()?;
        let converted = current
            .checked_mul(rate)
            .ok_or_else(|| ObligationError::Overflow(new_token.code.to_string()))?;
        let face_amount = Amount::from_decimal(converted, new_token)?;
        Ok(Self {
            face_amount,
            ..self.clone()
        })
    }

    pub fn with_due_by_date(&self, due_by: DateTime<Utc>, now: DateTime<Utc>) -> Result<Self, ObligationError> {
        require_future(due_by, now)?;
        Ok(Self {
            due_by: Some(due_by),
            ..self.clone()
        })
    }

    /// Replace whichever side `old` is with `new`.
    pub fn with_new_counterparty(&self, old: &AbstractParty, new: AbstractParty) -> Result<Self, ObligationError> {
        let mut next = self.clone();
        if self.obligor.same_as(old) {
            next.obligor = new;
        } else if self.obligee.same_as(old) {
            next.obligee = new;
        } else {
            return Err(ObligationError::NotAParty(old.owning_key()));
        }
        if next.obligor.same_as(&next.obligee) {
            return Err(ObligationError::SameParty);
        }
        Ok(next)
    }

    /// Both sides in their well-known form, as this node's resolver sees
    /// them. Fails if either side cannot be resolved.
    pub fn with_well_known_identities(&self, resolver: &dyn IdentityService) -> Result<Self, ObligationError> {
        let obligor = resolver.require_well_known_party(&self.obligor)?;
        let obligee = resolver.require_well_known_party(&self.obligee)?;
        Ok(Self {
            obligor: obligor.into(),
            obligee: obligee.into(),
            ..self.clone()
        })
    }

    // -----------------------------------------------------------------------
    // Settlement and payments
    // -----------------------------------------------------------------------

    pub fn with_settlement_method(&self, method: Option<SettlementMethod>) -> Self {
        Self {
            settlement_method: method,
            ..self.clone()
        }
    }

    pub fn with_payment(&self, payment: Payment) -> Result<Self, ObligationError> {
        self.face_amount.require_same_token(&payment.amount)?;
        if payment.amount.is_zero() {
            return Err(ObligationError::ZeroAmount);
        }
        if self.payment(&payment.reference).is_some() {
            return Err(ObligationError::DuplicatePayment(payment.reference));
        }
        let mut next = self.clone();
        next.payments.push(payment);
        Ok(next)
    }

    pub fn with_payment_status(&self, reference: &str, status: PaymentStatus) -> Result<Self, ObligationError> {
        let mut next = self.clone();
        let payment = next
            .payments
            .iter_mut()
            .find(|p| p.reference == reference)
            .ok_or_else(|| ObligationError::UnknownPayment(reference.to_string()))?;
        payment.status = status;
        Ok(next)
    }

    pub fn payment(&self, reference: &str) -> Option<&Payment> {
        self.payments.iter().find(|p| p.reference == reference)
    }

    /// Sum of settled payments.
    pub fn amount_paid(&self) -> Amount {
        let quantity = self
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Settled && p.amount.token == self.face_amount.token)
            .fold(0u64, |acc, p| acc.saturating_add(p.amount.quantity));
        Amount::new(quantity, self.face_amount.token.clone())
    }

    pub fn outstanding(&self) -> Amount {
        Amount::new(
            self.face_amount.quantity.saturating_sub(self.amount_paid().quantity),
            self.face_amount.token.clone(),
        )
    }

    pub fn is_settled(&self) -> bool {
        self.amount_paid().quantity >= self.face_amount.quantity
    }
}

impl ContractState for Obligation {
    fn participants(&self) -> Vec<AbstractParty> {
        vec![self.obligor.clone(), self.obligee.clone()]
    }
}

impl LinearState for Obligation {
    fn linear_id(&self) -> Uuid {
        self.linear_id
    }
}

fn require_future(due_by: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ObligationError> {
    if due_by <= now {
        return Err(ObligationError::DueDateNotInFuture { due_by, now });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use covenant_protocol::crypto::Keypair;
    use covenant_protocol::identity::{AnonymousParty, InMemoryIdentityService, NetworkMap, Party};
    use std::str::FromStr;
    use std::sync::Arc;

    fn party(name: &str) -> Party {
        Party::new(name, Keypair::generate().public_key())
    }

    fn sample() -> (Obligation, Party, Party) {
        let (alice, bob) = (party("Alice"), party("Bob"));
        let now = Utc::now();
        let obligation = Obligation::new(
            Amount::of(10_000, TokenType::USD).unwrap(),
            alice.clone().into(),
            bob.clone().into(),
            Some(now + Duration::days(30)),
            now,
        )
        .unwrap();
        (obligation, alice, bob)
    }

    #[test]
    fn new_rejects_same_party_on_both_sides() {
        let alice = party("Alice");
        let result = Obligation::new(
            Amount::of(1, TokenType::GBP).unwrap(),
            alice.clone().into(),
            alice.anonymise().into(),
            None,
            Utc::now(),
        );
        assert_eq!(result, Err(ObligationError::SameParty));
    }

    #[test]
    fn new_rejects_zero_and_past_due() {
        let (alice, bob) = (party("Alice"), party("Bob"));
        let now = Utc::now();
        assert_eq!(
            Obligation::new(Amount::zero(TokenType::GBP), alice.clone().into(), bob.clone().into(), None, now),
            Err(ObligationError::ZeroAmount)
        );
        assert!(matches!(
            Obligation::new(
                Amount::of(1, TokenType::GBP).unwrap(),
                alice.into(),
                bob.into(),
                Some(now),
                now
            ),
            Err(ObligationError::DueDateNotInFuture { .. })
        ));
    }

    #[test]
    fn token_change_multiplies_by_rate() {
        let (obligation, _, _) = sample();
        let xts = TokenType::new("XTS", 2).unwrap();
        let converted = obligation
            .with_new_face_value_token(xts.clone(), Decimal::from(2))
            .unwrap();
        assert_eq!(converted.face_amount, Amount::of(20_000, xts).unwrap());
        assert_eq!(converted.linear_id, obligation.linear_id);
        assert_eq!(obligation.face_amount, Amount::of(10_000, TokenType::USD).unwrap());
    }

    #[test]
    fn token_change_truncates_to_new_precision() {
        let (obligation, _, _) = sample();
        let rate = Decimal::from_str("148.256").unwrap();
        let converted = obligation.with_new_face_value_token(TokenType::JPY, rate).unwrap();
        // 10,000.00 * 148.256 = 1,482,560 exactly
        assert_eq!(converted.face_amount.quantity, 1_482_560);

        let rate = Decimal::from_str("0.00012345").unwrap();
        let converted = obligation.with_new_face_value_token(TokenType::GBP, rate).unwrap();
        // 1.2345 GBP -> 1.23
        assert_eq!(converted.face_amount.quantity, 123);
    }

    #[test]
    fn quantity_change_keeps_token() {
        let (obligation, _, _) = sample();
        let updated = obligation
            .with_new_face_value_quantity(Amount::of(5_000, TokenType::USD).unwrap())
            .unwrap();
        assert_eq!(updated.face_amount.quantity, 500_000);
        assert!(matches!(
            obligation.with_new_face_value_quantity(Amount::of(5_000, TokenType::GBP).unwrap()),
            Err(ObligationError::TokenMismatch { .. })
        ));
    }

    #[test]
    fn due_date_must_be_in_the_future() {
        let (obligation, _, _) = sample();
        let now = Utc::now();
        assert!(obligation.with_due_by_date(now - Duration::seconds(1), now).is_err());
        let later = now + Duration::days(1);
        assert_eq!(obligation.with_due_by_date(later, now).unwrap().due_by, Some(later));
    }

    #[test]
    fn counterparty_replacement() {
        let (obligation, alice, bob) = sample();
        let charlie = party("Charlie");

        let moved = obligation
            .with_new_counterparty(&bob.clone().into(), charlie.clone().into())
            .unwrap();
        assert!(moved.obligee.same_as(&charlie.clone().into()));
        assert!(moved.obligor.same_as(&alice.clone().into()));

        assert_eq!(
            obligation.with_new_counterparty(&bob.into(), alice.clone().into()),
            Err(ObligationError::SameParty)
        );
        assert!(matches!(
            obligation.with_new_counterparty(&party("Dave").into(), charlie.into()),
            Err(ObligationError::NotAParty(_))
        ));
    }

    #[test]
    fn well_known_identities_resolve_through_the_service() {
        let map = Arc::new(NetworkMap::new());
        let (alice, bob) = (party("Alice"), party("Bob"));
        map.publish(alice.clone()).unwrap();
        map.publish(bob.clone()).unwrap();
        let resolver = InMemoryIdentityService::new(Arc::clone(&map));

        let pseudonym = Keypair::generate().public_key();
        resolver.register_key(pseudonym, alice.clone()).unwrap();

        let now = Utc::now();
        let obligation = Obligation::new(
            Amount::of(1, TokenType::GBP).unwrap(),
            AnonymousParty::new(pseudonym).into(),
            bob.clone().into(),
            None,
            now,
        )
        .unwrap();

        let resolved = obligation.with_well_known_identities(&resolver).unwrap();
        assert_eq!(resolved.obligor, AbstractParty::from(alice));
        assert_eq!(resolved.obligee, AbstractParty::from(bob));

        let stranger = InMemoryIdentityService::new(map);
        assert!(matches!(
            obligation.with_well_known_identities(&stranger),
            Err(ObligationError::Identity(_))
        ));
    }

    #[test]
    fn payments_accumulate_until_settled() {
        let (obligation, _, _) = sample();
        let half = Amount::of(5_000, TokenType::USD).unwrap();

        let o = obligation.with_payment(Payment::sent("ref-1", half.clone())).unwrap();
        assert!(o.amount_paid().is_zero());

        let o = o.with_payment_status("ref-1", PaymentStatus::Settled).unwrap();
        assert_eq!(o.amount_paid(), half);
        assert!(!o.is_settled());
        assert_eq!(o.outstanding(), half);

        let o = o
            .with_payment(Payment::sent("ref-2", half.clone()))
            .unwrap()
            .with_payment_status("ref-2", PaymentStatus::Settled)
            .unwrap();
        assert!(o.is_settled());
        assert!(o.outstanding().is_zero());
    }

    #[test]
    fn payment_rules() {
        let (obligation, _, _) = sample();
        let usd = Amount::of(1, TokenType::USD).unwrap();
        let o = obligation.with_payment(Payment::sent("ref-1", usd.clone())).unwrap();

        assert_eq!(
            o.with_payment(Payment::sent("ref-1", usd)),
            Err(ObligationError::DuplicatePayment("ref-1".into()))
        );
        assert_eq!(
            o.with_payment_status("nope", PaymentStatus::Failed),
            Err(ObligationError::UnknownPayment("nope".into()))
        );
        assert!(matches!(
            o.with_payment(Payment::sent("ref-2", Amount::of(1, TokenType::GBP).unwrap())),
            Err(ObligationError::TokenMismatch { .. })
        ));
    }

    #[test]
    fn participants_are_both_sides() {
        let (obligation, alice, bob) = sample();
        assert_eq!(
            obligation.participants(),
            vec![AbstractParty::from(alice), AbstractParty::from(bob)]
        );
        assert_eq!(obligation.linear_id(), obligation.linear_id);
    }
}
