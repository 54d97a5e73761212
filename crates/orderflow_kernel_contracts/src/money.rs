#![forbid(unsafe_code)]

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::common::ContractViolation;

/// The single money value type shared by every component. All arithmetic
/// lands on the same 3-decimal, half-up rounding policy so commission and
/// deficit values match bit-for-bit across engines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn round3(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ContractViolation> {
        let value = Decimal::from_str(raw.trim()).map_err(|_| ContractViolation::InvalidValue {
            field,
            reason: "must be a decimal number",
        })?;
        Ok(Self::round3(value))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn plus(self, other: Money) -> Money {
        Self::round3(self.0 + other.0)
    }

    /// `self - other`, floored at zero. This is the deficit shape: the
    /// shortfall is never reported as a negative credit.
    pub fn minus_or_zero(self, other: Money) -> Money {
        if self.0 > other.0 {
            Self::round3(self.0 - other.0)
        } else {
            Money::ZERO
        }
    }

    pub fn mul_rate(self, rate: Decimal) -> Money {
        Self::round3(self.0 * rate)
    }

    pub fn max(self, other: Money) -> Money {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Integer cents, half-up. Order totals are tracked per day in this
    /// form so "identical-looking" previews compare exactly.
    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0)
    }

    pub fn units_floor(self) -> i64 {
        self.0.floor().to_i64().unwrap_or(0)
    }

    pub fn units_ceil(self) -> i64 {
        self.0.ceil().to_i64().unwrap_or(0)
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
