//! Fixed-point coin amounts
//!
//! A [`Coins`] value is an integer amount of the smallest unit (`nano_value`)
//! together with the number of `decimals` it is scaled by. TON uses 9
//! decimals; jettons may use any other scale. Comparison and arithmetic
//! between different scales rescale to the larger one first.

use crate::tvm::error::{Result, TvmError};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Rem, Sub};
use std::str::FromStr;

/// Decimals of the native TON coin
pub const DEFAULT_DECIMALS: u32 = 9;

/// An amount of coins with a fixed number of decimals
#[derive(Debug, Clone)]
pub struct Coins {
    nano_value: BigInt,
    decimals: u32,
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u8).pow(exp)
}

impl Coins {
    /// Amount in nano units with 9 decimals
    pub fn from_nano(nano_value: impl Into<BigInt>) -> Self {
        Self::from_nano_with_decimals(nano_value, DEFAULT_DECIMALS)
    }

    pub fn from_nano_with_decimals(nano_value: impl Into<BigInt>, decimals: u32) -> Self {
        Self {
            nano_value: nano_value.into(),
            decimals,
        }
    }

    /// Parses a decimal amount such as `"13.2"` or `"-0.5"`
    pub fn from_decimal_str(value: &str, decimals: u32) -> Result<Self> {
        let invalid = || TvmError::InvalidCoins(value.to_string());
        let trimmed = value.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(invalid());
        }
        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.len() > decimals as usize {
            return Err(invalid());
        }

        let padded = format!("{int_part}{frac_part:0<width$}", width = decimals as usize);
        let mut nano_value = if padded.is_empty() {
            BigInt::zero()
        } else {
            padded.parse::<BigInt>().map_err(|_| invalid())?
        };
        if negative {
            nano_value = -nano_value;
        }
        Ok(Self::from_nano_with_decimals(nano_value, decimals))
    }

    pub fn nano_value(&self) -> &BigInt {
        &self.nano_value
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_negative(&self) -> bool {
        self.nano_value.is_negative()
    }

    /// Rescales to `to` decimals, truncating extra precision
    pub fn to_decimals(&self, to: u32) -> Self {
        let nano_value = match self.decimals.cmp(&to) {
            Ordering::Greater => &self.nano_value / pow10(self.decimals - to),
            Ordering::Less => &self.nano_value * pow10(to - self.decimals),
            Ordering::Equal => self.nano_value.clone(),
        };
        Self::from_nano_with_decimals(nano_value, to)
    }

    /// Decimal representation without trailing zeros
    pub fn to_float_string(&self) -> String {
        let scale = pow10(self.decimals);
        let magnitude = self.nano_value.abs();
        let int_part = &magnitude / &scale;
        let frac_part = &magnitude % &scale;

        let mut result = String::new();
        if self.nano_value.is_negative() {
            result.push('-');
        }
        result.push_str(&int_part.to_string());
        if !frac_part.is_zero() {
            let frac = format!("{:0>width$}", frac_part.to_string(), width = self.decimals as usize);
            result.push('.');
            result.push_str(frac.trim_end_matches('0'));
        }
        result
    }

    /// Both nano values expressed at the larger of the two scales
    fn aligned(&self, other: &Self) -> (BigInt, BigInt, u32) {
        let decimals = self.decimals.max(other.decimals);
        (
            self.to_decimals(decimals).nano_value,
            other.to_decimals(decimals).nano_value,
            decimals,
        )
    }
}

impl Default for Coins {
    fn default() -> Self {
        Self::from_nano(0)
    }
}

impl FromStr for Coins {
    type Err = TvmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_decimal_str(s, DEFAULT_DECIMALS)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_float_string())
    }
}

impl PartialEq for Coins {
    fn eq(&self, other: &Self) -> bool {
        let (lhs, rhs, _) = self.aligned(other);
        lhs == rhs
    }
}

impl Eq for Coins {}

impl PartialOrd for Coins {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coins {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs, _) = self.aligned(other);
        lhs.cmp(&rhs)
    }
}

impl Hash for Coins {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // equal amounts at different scales must hash alike
        let ten = BigInt::from(10u8);
        let mut nano_value = self.nano_value.clone();
        let mut decimals = self.decimals;
        while decimals > 0 && !nano_value.is_zero() && (&nano_value % &ten).is_zero() {
            nano_value /= &ten;
            decimals -= 1;
        }
        if nano_value.is_zero() {
            decimals = 0;
        }
        nano_value.hash(state);
        decimals.hash(state);
    }
}

impl Add for Coins {
    type Output = Coins;

    fn add(self, rhs: Coins) -> Coins {
        let (lhs, rhs, decimals) = self.aligned(&rhs);
        Coins::from_nano_with_decimals(lhs + rhs, decimals)
    }
}

impl Sub for Coins {
    type Output = Coins;

    fn sub(self, rhs: Coins) -> Coins {
        let (lhs, rhs, decimals) = self.aligned(&rhs);
        Coins::from_nano_with_decimals(lhs - rhs, decimals)
    }
}

impl Mul for Coins {
    type Output = Coins;

    fn mul(self, rhs: Coins) -> Coins {
        let decimals = self.decimals.max(rhs.decimals);
        let scale = pow10(self.decimals.min(rhs.decimals));
        Coins::from_nano_with_decimals(self.nano_value * rhs.nano_value / scale, decimals)
    }
}

impl Div for Coins {
    type Output = Coins;

    /// # Panics
    ///
    /// Panics if `rhs` is zero.
    fn div(self, rhs: Coins) -> Coins {
        let (lhs, rhs, decimals) = self.aligned(&rhs);
        Coins::from_nano_with_decimals(lhs * pow10(decimals) / rhs, decimals)
    }
}

impl Rem for Coins {
    type Output = Coins;

    /// # Panics
    ///
    /// Panics if `rhs` is zero.
    fn rem(self, rhs: Coins) -> Coins {
        let (lhs, rhs, decimals) = self.aligned(&rhs);
        Coins::from_nano_with_decimals(lhs % rhs, decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            "10".parse::<Coins>().unwrap().nano_value(),
            &BigInt::from(10_000_000_000i64)
        );
        assert_eq!(
            "13.2".parse::<Coins>().unwrap().nano_value(),
            &BigInt::from(13_200_000_000i64)
        );
        assert_eq!(
            "0.2".parse::<Coins>().unwrap().nano_value(),
            &BigInt::from(200_000_000)
        );
        assert_eq!(
            Coins::from_decimal_str("1", 2).unwrap().nano_value(),
            &BigInt::from(100)
        );
        assert_eq!(
            Coins::from_decimal_str("0.1", 2).unwrap().nano_value(),
            &BigInt::from(10)
        );
        assert_eq!(
            "-1.5".parse::<Coins>().unwrap().nano_value(),
            &BigInt::from(-1_500_000_000)
        );
        assert_eq!(Coins::from_decimal_str("1.50", 1).unwrap().nano_value(), &BigInt::from(15));
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Coins>().is_err());
        assert!("abc".parse::<Coins>().is_err());
        assert!("1.2.3".parse::<Coins>().is_err());
        assert!(Coins::from_decimal_str("0.001", 2).is_err());
    }

    #[test]
    fn test_float_string() {
        assert_eq!(Coins::from_nano(13_200_000_000i64).to_string(), "13.2");
        assert_eq!(Coins::from_nano(1).to_string(), "0.000000001");
        assert_eq!(Coins::from_nano(0).to_string(), "0");
        assert_eq!(Coins::from_nano(-500_000_000).to_string(), "-0.5");
        assert_eq!(Coins::from_nano_with_decimals(42, 0).to_string(), "42");
    }

    #[test]
    fn test_to_decimals() {
        let coins = Coins::from_nano(1_234_567_891);
        assert_eq!(coins.to_decimals(3).nano_value(), &BigInt::from(1234));
        assert_eq!(coins.to_decimals(10).nano_value(), &BigInt::from(12_345_678_910i64));
    }

    #[test]
    fn test_cross_scale_multiplication() {
        let lhs = Coins::from_decimal_str("2.0", 5).unwrap();
        let rhs = Coins::from_decimal_str("2.0", 10).unwrap();
        let product = lhs * rhs;
        assert_eq!(product.decimals(), 10);
        assert_eq!(product.nano_value(), &BigInt::from(40_000_000_000i64));
        assert_eq!(product, Coins::from_decimal_str("4", 10).unwrap());
    }

    #[test]
    fn test_arithmetic() {
        let a: Coins = "1.5".parse().unwrap();
        let b = Coins::from_decimal_str("0.25", 2).unwrap();
        assert_eq!((a.clone() + b.clone()).to_string(), "1.75");
        assert_eq!((a.clone() - b.clone()).to_string(), "1.25");
        assert_eq!((a.clone() / b.clone()).to_string(), "6");
        assert_eq!((a % b).to_string(), "0");
        let c = Coins::from_decimal_str("0.4", 1).unwrap();
        assert_eq!(("1".parse::<Coins>().unwrap() % c).to_string(), "0.2");
    }

    #[test]
    fn test_cross_scale_equality() {
        use std::collections::HashSet;

        let a = Coins::from_decimal_str("1.5", 2).unwrap();
        let b = Coins::from_decimal_str("1.5", 9).unwrap();
        assert_eq!(a, b);
        assert!(Coins::from_decimal_str("1.4", 9).unwrap() < a);

        let set: HashSet<Coins> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
