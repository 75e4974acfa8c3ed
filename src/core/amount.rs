//! Fixed-point coin amounts
//!
//! Amounts are held as an integer count of 10^-8 units so that sums,
//! change and the zakat levy are exact. On the wire and in persisted
//! records they remain plain JSON numbers expressed in coins.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest units per coin (8 decimal places)
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Number of decimal places carried by an amount
pub const DECIMALS: usize = 8;

/// Basis points in one whole (100%)
pub const BASIS_POINTS: u64 = 10_000;

/// Errors parsing an amount
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    Invalid(String),
    #[error("Amount has more than {DECIMALS} decimal places: {0}")]
    TooPrecise(String),
    #[error("Amount overflow")]
    Overflow,
}

/// A non-negative coin amount with 8 decimal places of precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Amount from raw 10^-8 units
    pub const fn from_units(units: u64) -> Self {
        Amount(units)
    }

    /// Amount from whole coins
    pub const fn from_coins(coins: u64) -> Self {
        Amount(coins * UNITS_PER_COIN)
    }

    /// Raw 10^-8 units
    pub const fn units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Lossy conversion to floating-point coins
    pub fn as_coins_f64(self) -> f64 {
        self.0 as f64 / UNITS_PER_COIN as f64
    }

    /// Nearest amount to a floating-point coin value.
    /// Negative, NaN and out-of-range values are rejected.
    pub fn from_coins_f64(coins: f64) -> Result<Self, AmountError> {
        if !coins.is_finite() || coins < 0.0 {
            return Err(AmountError::Invalid(coins.to_string()));
        }
        let units = (coins * UNITS_PER_COIN as f64).round();
        if units > u64::MAX as f64 {
            return Err(AmountError::Overflow);
        }
        Ok(Amount(units as u64))
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Share of this amount expressed in basis points, rounded down
    pub fn basis_points(self, bps: u32) -> Amount {
        let share = (self.0 as u128 * bps as u128) / BASIS_POINTS as u128;
        Amount(share as u64)
    }

    /// Sum an iterator of amounts, `None` on overflow
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Option<Amount> {
        iter.into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / UNITS_PER_COIN,
            self.0 % UNITS_PER_COIN,
            width = DECIMALS
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AmountError::Invalid(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > DECIMALS {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = DECIMALS);
            padded.parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(UNITS_PER_COIN)
            .and_then(|units| units.checked_add(frac_units))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_coins_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coins = f64::deserialize(deserializer)?;
        Amount::from_coins_f64(coins).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_has_eight_decimals() {
        assert_eq!(Amount::from_coins(30).to_string(), "30.00000000");
        assert_eq!(Amount::from_units(1).to_string(), "0.00000001");
        assert_eq!(Amount::from_units(250_000_000).to_string(), "2.50000000");
    }

    #[test]
    fn test_parse() {
        assert_eq!("30".parse::<Amount>().unwrap(), Amount::from_coins(30));
        assert_eq!("0.01".parse::<Amount>().unwrap(), Amount::from_units(1_000_000));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount::from_units(50_000_000));
        assert!("1.123456789".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!(".".parse::<Amount>().is_err());
    }

    #[test]
    fn test_basis_points_rounds_down() {
        // 2.5% of 100 coins
        assert_eq!(Amount::from_coins(100).basis_points(250), Amount::from_units(250_000_000));
        // 2.5% of 39 units is 0.975 units
        assert_eq!(Amount::from_units(39).basis_points(250), Amount::ZERO);
    }

    #[test]
    fn test_json_layout_is_number() {
        let json = serde_json::to_string(&Amount::from_coins(70)).unwrap();
        assert_eq!(json, "70.0");
        let back: Amount = serde_json::from_str("0.1").unwrap();
        assert_eq!(back, Amount::from_units(10_000_000));
        assert!(serde_json::from_str::<Amount>("-3.0").is_err());
    }

    #[test]
    fn test_checked_sum() {
        let total = Amount::checked_sum([Amount::from_coins(1), Amount::from_units(5)]);
        assert_eq!(total, Some(Amount::from_units(UNITS_PER_COIN + 5)));
        assert_eq!(Amount::checked_sum([Amount::from_units(u64::MAX), Amount::from_units(1)]), None);
    }
}
