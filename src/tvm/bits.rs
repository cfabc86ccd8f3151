//! Bit sequences
//!
//! Cells store their content as sequences of single bits. [`Bits`] wraps a
//! `Vec<bool>` and adds the conversions used across the engine: TL-B
//! augmentation (`1` marker followed by zero padding), big-endian integer
//! interpretation and hex/byte encoding.

use crate::tvm::error::{Result, TvmError};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use std::borrow::Borrow;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// An owned sequence of bits, most significant first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bits(Vec<bool>);

impl Bits {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Unpacks bytes into bits, MSB first
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for byte in bytes {
            for i in (0..8).rev() {
                bits.push((byte >> i) & 1 == 1);
            }
        }
        Self(bits)
    }

    /// Parses a hex string, four bits per digit
    pub fn from_hex(hex: &str) -> Result<Self> {
        let mut bits = Vec::with_capacity(hex.len() * 4);
        for c in hex.chars() {
            let nibble = c
                .to_digit(16)
                .ok_or_else(|| TvmError::InvalidFift(format!("unexpected hex digit {c:?}")))?;
            for i in (0..4).rev() {
                bits.push((nibble >> i) & 1 == 1);
            }
        }
        Ok(Self(bits))
    }

    /// Encodes the low `size` bits of `value`, big-endian
    pub fn from_biguint(value: &BigUint, size: usize) -> Result<Self> {
        if value.bits() as usize > size {
            return Err(TvmError::IntOverflow {
                value: value.to_string(),
                bits: size,
            });
        }
        Ok(Self((0..size).rev().map(|i| value.bit(i as u64)).collect()))
    }

    pub fn into_inner(self) -> Vec<bool> {
        self.0
    }

    /// Returns a copy with a `1` marker and zero padding up to a multiple of `divider`
    ///
    /// Already aligned sequences are returned unchanged.
    pub fn augment(&self, divider: usize) -> Self {
        let mut result = self.clone();
        let amount = divider - (self.len() % divider);
        if amount == 0 || amount == divider {
            return result;
        }
        result.push(true);
        result.extend(std::iter::repeat(false).take(amount - 1));
        result
    }

    /// Strips the augmentation marker and its trailing zeros
    pub fn rollback(&self) -> Result<Self> {
        let mut result = self.clone();
        result.rollback_in_place()?;
        Ok(result)
    }

    /// In-place variant of [`Bits::rollback`]
    pub fn rollback_in_place(&mut self) -> Result<()> {
        let tail = self.len().min(7);
        let start = self.len() - tail;
        match self.0[start..].iter().rposition(|bit| *bit) {
            Some(pos) => {
                self.0.truncate(start + pos);
                Ok(())
            }
            None => Err(TvmError::InvalidAugmentation),
        }
    }

    /// Unsigned big-endian value; empty sequence is zero
    pub fn to_big_uint(&self) -> BigUint {
        let mut value = BigUint::zero();
        for bit in self.iter() {
            value <<= 1u8;
            if *bit {
                value += 1u8;
            }
        }
        value
    }

    /// Two's complement big-endian value; empty sequence is zero
    pub fn to_big_int(&self) -> BigInt {
        let unsigned = BigInt::from_biguint(Sign::Plus, self.to_big_uint());
        match self.first() {
            Some(true) => unsigned - (BigInt::from(1u8) << self.len()),
            _ => unsigned,
        }
    }

    /// Uppercase hex, requires a bit length divisible by 4
    pub fn to_hex(&self) -> Result<String> {
        if self.len() % 4 != 0 {
            return Err(TvmError::BitsNotAligned {
                len: self.len(),
                divider: 4,
            });
        }
        Ok(self
            .chunks(4)
            .map(|nibble| {
                let value = nibble.iter().fold(0u32, |acc, bit| (acc << 1) | *bit as u32);
                std::char::from_digit(value, 16).map_or('0', |c| c.to_ascii_uppercase())
            })
            .collect())
    }

    /// Packs into bytes, requires a bit length divisible by 8
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.len() % 8 != 0 {
            return Err(TvmError::BitsNotAligned {
                len: self.len(),
                divider: 8,
            });
        }
        Ok(self
            .chunks(8)
            .map(|byte| byte.iter().fold(0u8, |acc, bit| (acc << 1) | *bit as u8))
            .collect())
    }
}

impl Deref for Bits {
    type Target = Vec<bool>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Bits {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Borrow<[bool]> for Bits {
    fn borrow(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for Bits {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl From<&[bool]> for Bits {
    fn from(bits: &[bool]) -> Self {
        Self(bits.to_vec())
    }
}

impl FromIterator<bool> for Bits {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pattern: &str) -> Bits {
        pattern.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_augment() {
        assert_eq!(bits("10111").augment(8), bits("10111100"));
        assert_eq!(bits("1011").augment(4), bits("1011"));
        assert_eq!(bits("101").augment(4), bits("1011"));
        assert_eq!(Bits::new().augment(8), Bits::new());
    }

    #[test]
    fn test_rollback() {
        assert_eq!(bits("10111100").rollback().unwrap(), bits("10111"));
        assert_eq!(bits("10000000").rollback().unwrap(), Bits::new());
        assert!(bits("00000000").rollback().is_err());
        assert!(Bits::new().rollback().is_err());
    }

    #[test]
    fn test_augment_rollback_random() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(0..64);
            let original: Bits = (0..len).map(|_| rng.r#gen::<bool>()).collect();
            if original.len() % 8 == 0 {
                continue;
            }
            let augmented = original.augment(8);
            assert_eq!(augmented.len() % 8, 0);
            assert_eq!(augmented.rollback().unwrap(), original);
        }
    }

    #[test]
    fn test_big_int_conversion() {
        let value = bits("110000101001");
        assert_eq!(value.to_big_int(), BigInt::from(-983));
        assert_eq!(value.to_big_uint(), BigUint::from(3113u32));
        assert_eq!(Bits::new().to_big_uint(), BigUint::zero());
        assert_eq!(Bits::new().to_big_int(), BigInt::zero());
        assert_eq!(bits("0111").to_big_int(), BigInt::from(7));
    }

    #[test]
    fn test_hex() {
        assert_eq!(bits("10101111").to_hex().unwrap(), "AF");
        assert!(bits("101").to_hex().is_err());
        assert_eq!(Bits::from_hex("af0").unwrap(), bits("101011110000"));
        assert!(Bits::from_hex("xz").is_err());
    }

    #[test]
    fn test_bytes() {
        let value = Bits::from_bytes(&[0x80, 0x01]);
        assert_eq!(value.len(), 16);
        assert!(value[0] && value[15]);
        assert_eq!(value.to_bytes().unwrap(), vec![0x80, 0x01]);
        assert!(bits("1").to_bytes().is_err());
    }

    #[test]
    fn test_from_biguint() {
        let value = Bits::from_biguint(&BigUint::from(5u8), 4).unwrap();
        assert_eq!(value, bits("0101"));
        assert!(Bits::from_biguint(&BigUint::from(16u8), 4).is_err());
        assert_eq!(value.to_string(), "0101");
    }
}
