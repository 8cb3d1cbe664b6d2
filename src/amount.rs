//! Ledger amounts: unsigned base units with eight decimal places

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places carried by an [`Amount`].
pub const DECIMALS: u32 = 8;

/// Base units in one whole unit.
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// A non-negative quantity of value, stored as base units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u64) -> Self {
        Amount(units)
    }

    /// Whole coins; fails if the result does not fit in base units.
    pub fn from_coins(coins: u64) -> Result<Self, ChainError> {
        coins
            .checked_mul(UNITS_PER_COIN)
            .map(Amount)
            .ok_or_else(|| ChainError::InvalidInput(format!("Amount {} overflows", coins)))
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Value in whole coins as a float, as shown to wallet clients.
    pub fn to_coins_f64(self) -> f64 {
        self.0 as f64 / UNITS_PER_COIN as f64
    }

    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_COIN;
        let fraction = self.0 % UNITS_PER_COIN;
        if fraction == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", fraction, width = DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = ChainError;

    /// Parses a decimal such as `"40"`, `"0.5"` or `"12.00000001"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &str| ChainError::InvalidInput(format!("Invalid amount '{}': {}", s, reason));

        if s.is_empty() {
            return Err(invalid("empty"));
        }
        if s.starts_with('-') {
            return Err(invalid("negative"));
        }

        let (whole, fraction) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("not a number"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a number"));
        }
        if fraction.len() > DECIMALS as usize {
            return Err(invalid("more than 8 decimal places"));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| invalid("overflow"))?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let scale = 10u64.pow(DECIMALS - fraction.len() as u32);
            fraction.parse::<u64>().map_err(|_| invalid("not a number"))? * scale
        };

        whole_units
            .checked_mul(UNITS_PER_COIN)
            .and_then(|w| w.checked_add(fraction_units))
            .map(Amount)
            .ok_or_else(|| invalid("overflow"))
    }
}

/// An amount as it arrives over the wire: either a JSON string or a JSON number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    pub fn parse(&self) -> Result<Amount, ChainError> {
        match self {
            AmountInput::Text(s) => s.parse(),
            // Render the number back to text so decimals are handled exactly.
            AmountInput::Number(n) => expand_exponent(&n.to_string())?.parse(),
        }
    }
}

/// Rewrites a number printed in exponent form (`1.5e-5`) as a plain decimal.
///
/// Only JSON numbers go through this; textual amounts must already be plain decimals.
fn expand_exponent(number: &str) -> Result<String, ChainError> {
    let Some((mantissa, exponent)) = number.split_once(|c| c == 'e' || c == 'E') else {
        return Ok(number.to_string());
    };
    let invalid = || ChainError::InvalidInput(format!("Invalid amount '{}'", number));

    let exponent: i64 = exponent.parse().map_err(|_| invalid())?;
    // Anything this far out either has too many decimals or overflows.
    if exponent.abs() > 64 {
        return Err(invalid());
    }
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", whole, fraction);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let point = whole.len() as i64 + exponent;
    let plain = if point <= 0 {
        format!("0.{}{}", "0".repeat(point.unsigned_abs() as usize), digits)
    } else if point as usize >= digits.len() {
        format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
    } else {
        let (left, right) = digits.split_at(point as usize);
        format!("{}.{}", left, right)
    };
    Ok(format!("{}{}", sign, plain))
}
