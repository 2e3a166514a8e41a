//! FX rate request and response exchanged with a rate oracle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::token::TokenType;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FxRateRequest {
    pub base_currency: TokenType,
    pub counter_currency: TokenType,
    pub time: DateTime<Utc>,
}

/// Units of `counter_currency` per unit of `base_currency` at `time`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxRate {
    pub base_currency: TokenType,
    pub counter_currency: TokenType,
    pub time: DateTime<Utc>,
    pub rate: Decimal,
}

/// Serde helper for an optional rate carried inside a ledger command.
///
/// `Decimal`'s own `Deserialize` goes through `deserialize_any`, which the
/// canonical (bincode) component encoding cannot drive. The rate travels as
/// its decimal string instead, in every format.
///
/// ```ignore
/// #[serde(with = "crate::fx::optional_rate")]
/// fx_rate: Option<Decimal>,
/// ```
pub mod optional_rate {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(rate: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        rate.map(|r| r.to_string()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Decimal::from_str(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

impl FxRateRequest {
    pub fn new(base_currency: TokenType, counter_currency: TokenType, time: DateTime<Utc>) -> Self {
        Self {
            base_currency,
            counter_currency,
            time,
        }
    }

    /// Answer this request with `rate`.
    pub fn answer(&self, rate: Decimal) -> FxRate {
        FxRate {
            base_currency: self.base_currency.clone(),
            counter_currency: self.counter_currency.clone(),
            time: self.time,
            rate,
        }
    }

    /// Whether `response` is for exactly this request.
    pub fn is_answered_by(&self, response: &FxRate) -> bool {
        self.base_currency == response.base_currency
            && self.counter_currency == response.counter_currency
            && self.time == response.time
    }
}
