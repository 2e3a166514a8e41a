//! # Tokens and Amounts
//!
//! An [`Amount`] is an integer quantity of the smallest unit of a
//! [`TokenType`]: 10,000.00 GBP is `Amount { quantity: 1_000_000, token: GBP }`.
//! Arithmetic that has to cross tokens (FX conversion) goes through
//! [`rust_decimal::Decimal`] so that no binary floating point is ever
//! involved.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::ObligationError;

/// Largest precision a token may declare. Keeps every quantity inside
/// `Decimal`'s 28-digit scale.
pub const MAX_FRACTION_DIGITS: u32 = 18;

/// A currency or other fungible unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenType {
    pub code: Cow<'static, str>,
    pub fraction_digits: u32,
}

impl TokenType {
    pub const GBP: TokenType = TokenType::fiat("GBP", 2);
    pub const USD: TokenType = TokenType::fiat("USD", 2);
    pub const EUR: TokenType = TokenType::fiat("EUR", 2);
    pub const JPY: TokenType = TokenType::fiat("JPY", 0);
    pub const XRP: TokenType = TokenType::fiat("XRP", 6);

    const fn fiat(code: &'static str, fraction_digits: u32) -> Self {
        Self {
            code: Cow::Borrowed(code),
            fraction_digits,
        }
    }

    pub fn new(code: impl Into<String>, fraction_digits: u32) -> Result<Self, ObligationError> {
        if fraction_digits > MAX_FRACTION_DIGITS {
            return Err(ObligationError::InvalidFractionDigits(fraction_digits));
        }
        Ok(Self {
            code: Cow::Owned(code.into()),
            fraction_digits,
        })
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// A quantity of a token, in the token's smallest unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub quantity: u64,
    pub token: TokenType,
}

impl Amount {
    pub fn new(quantity: u64, token: TokenType) -> Self {
        Self { quantity, token }
    }

    /// Whole units: `Amount::of(10_000, GBP)` is 10,000.00 GBP.
    pub fn of(units: u64, token: TokenType) -> Result<Self, ObligationError> {
        let factor = unit_factor(&token)?;
        let quantity = units
            .checked_mul(factor)
            .ok_or_else(|| ObligationError::Overflow(token.code.to_string()))?;
        Ok(Self { quantity, token })
    }

    pub fn zero(token: TokenType) -> Self {
        Self { quantity: 0, token }
    }

    pub fn is_zero(&self) -> bool {
        self.quantity == 0
    }

    /// The amount in whole units, exactly.
    pub fn to_decimal(&self) -> Result<Decimal, ObligationError> {
        Decimal::try_from_i128_with_scale(i128::from(self.quantity), self.token.fraction_digits)
            .map_err(|_| ObligationError::Overflow(self.token.code.to_string()))
    }

    /// Quantise a whole-unit decimal into `token`'s smallest unit, rounding
    /// toward zero. Fails if the result is zero, negative or too large.
    pub fn from_decimal(value: Decimal, token: TokenType) -> Result<Self, ObligationError> {
        let overflow = || ObligationError::Overflow(token.code.to_string());
        let factor = Decimal::from(unit_factor(&token)?);
        let scaled = value.checked_mul(factor).ok_or_else(overflow)?.trunc();
        if scaled <= Decimal::ZERO {
            return Err(ObligationError::ZeroAmount);
        }
        let quantity = scaled.to_u64().ok_or_else(overflow)?;
        Ok(Self { quantity, token })
    }

    /// Sum of two amounts of the same token.
    pub fn checked_add(&self, other: &Amount) -> Result<Amount, ObligationError> {
        self.require_same_token(other)?;
        let quantity = self
            .quantity
            .checked_add(other.quantity)
            .ok_or_else(|| ObligationError::Overflow(self.token.code.to_string()))?;
        Ok(Amount::new(quantity, self.token.clone()))
    }

    pub fn require_same_token(&self, other: &Amount) -> Result<(), ObligationError> {
        if self.token != other.token {
            return Err(ObligationError::TokenMismatch {
                expected: self.token.to_string(),
                actual: other.token.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Ok(value) => write!(f, "{} {}", value, self.token),
            Err(_) => write!(f, "{}e-{} {}", self.quantity, self.token.fraction_digits, self.token),
        }
    }
}

fn unit_factor(token: &TokenType) -> Result<u64, ObligationError> {
    if token.fraction_digits > MAX_FRACTION_DIGITS {
        return Err(ObligationError::InvalidFractionDigits(token.fraction_digits));
    }
    10u64
        .checked_pow(token.fraction_digits)
        .ok_or_else(|| ObligationError::Overflow(token.code.to_string()))
}
