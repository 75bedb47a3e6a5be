//! Token amounts in integer micro-units.
//!
//! Amounts are carried exclusively as unsigned integers in the asset's
//! smallest unit (one micro-unit is 10^-6 of the display unit for six-decimal
//! stablecoins). Floating point never touches an amount: conversion from USD
//! display values goes through [`rust_decimal::Decimal`] and fails loudly on
//! anything that does not map exactly.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fractional digits carried by supported stablecoin assets.
pub const MICRO_UNIT_SCALE: u32 = 6;

const MICRO_UNITS_PER_UNIT: u64 = 1_000_000;

/// A token amount in integer micro-units.
///
/// Serializes as a decimal string to survive JSON parsers that cannot
/// represent large integers exactly. Negative amounts are unrepresentable.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TokenAmount(u64);

impl TokenAmount {
    /// Wraps a raw micro-unit count.
    #[must_use]
    pub const fn new(micro_units: u64) -> Self {
        Self(micro_units)
    }

    /// Returns the raw micro-unit count.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for u64 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl FromStr for TokenAmount {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>().map(Self).map_err(serde::de::Error::custom)
    }
}

/// Errors converting a USD display value into micro-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The value is negative.
    #[error("amount is negative")]
    Negative,
    /// The value carries more fractional digits than the asset supports.
    #[error("amount has more than {MICRO_UNIT_SCALE} fractional digits")]
    ExcessPrecision,
    /// The value does not fit in a `u64` micro-unit count.
    #[error("amount exceeds the representable micro-unit range")]
    Overflow,
}

/// Converts a USD display value into integer micro-units.
///
/// The conversion is exact: values with more than [`MICRO_UNIT_SCALE`]
/// fractional digits are rejected rather than rounded.
///
/// # Errors
///
/// Returns [`AmountError`] for negative values, values with sub-micro-unit
/// precision, and values that overflow `u64`.
pub fn usd_to_micro_units(usd: Decimal) -> Result<TokenAmount, AmountError> {
    if usd < Decimal::ZERO {
        return Err(AmountError::Negative);
    }
    let normalized = usd.normalize();
    if normalized.scale() > MICRO_UNIT_SCALE {
        return Err(AmountError::ExcessPrecision);
    }
    let micro = normalized
        .checked_mul(Decimal::from(MICRO_UNITS_PER_UNIT))
        .ok_or(AmountError::Overflow)?;
    micro.to_u64().map(TokenAmount).ok_or(AmountError::Overflow)
}

/// Converts integer micro-units back into a USD display value.
///
/// Exact inverse of [`usd_to_micro_units`] for every representable amount.
#[must_use]
pub fn micro_units_to_usd(amount: TokenAmount) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(amount.inner()), MICRO_UNIT_SCALE).normalize()
}
