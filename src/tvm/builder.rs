//! Builder for constructing cells
//!
//! [`CellBuilder`] accumulates bits and references with capacity checks and
//! finalizes into an immutable [`Cell`]. Every `store_*` method is fallible and
//! returns `&mut Self` so calls can be chained with `?`.
//!
//! # Examples
//!
//! ```rust
//! use tonutils_boc::tvm::{Address, CellBuilder};
//!
//! let mut builder = CellBuilder::new();
//! let addr = Address::new(0, [0u8; 32]);
//! builder.store_address(Some(&addr)).unwrap();
//! builder.store_uint(42, 32).unwrap();
//! builder.store_string("Hello, TON!").unwrap();
//! let cell = builder.build().unwrap();
//! assert_eq!(cell.bit_len(), 267 + 32 + 88);
//! ```

use crate::tvm::address::Address;
use crate::tvm::bits::Bits;
use crate::tvm::cell::{Cell, CellType, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::tvm::coins::Coins;
use crate::tvm::error::{Result, TvmError};
use crate::tvm::slice::CellSlice;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, Zero};
use std::sync::Arc;

/// Mutable accumulator for cell content
#[derive(Debug, Clone)]
pub struct CellBuilder {
    size: usize,
    bits: Bits,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    /// Creates an empty builder with the ordinary cell capacity
    pub fn new() -> Self {
        Self::with_size(MAX_CELL_BITS)
    }

    /// Creates an empty builder holding at most `size` bits
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            bits: Bits::new(),
            refs: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bits(&self) -> &Bits {
        &self.bits
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    /// Content padded to whole bytes
    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.bits.augment(8).to_bytes()
    }

    /// Returns the number of available bits
    pub fn remainder(&self) -> usize {
        self.size - self.bits.len()
    }

    /// Returns the number of available references
    pub fn available_refs(&self) -> usize {
        MAX_CELL_REFS - self.refs.len()
    }

    fn check_bits_overflow(&self, size: usize) -> Result<()> {
        if size > self.remainder() {
            return Err(TvmError::BitsOverflow {
                requested: size,
                available: self.remainder(),
            });
        }
        Ok(())
    }

    fn check_refs_overflow(&self, count: usize) -> Result<()> {
        if count > self.available_refs() {
            return Err(TvmError::RefsOverflow);
        }
        Ok(())
    }

    /// Stores a single bit
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.check_bits_overflow(1)?;
        self.bits.push(bit);
        Ok(self)
    }

    /// Stores a sequence of bits
    pub fn store_bits(&mut self, bits: &[bool]) -> Result<&mut Self> {
        self.check_bits_overflow(bits.len())?;
        self.bits.extend_from_slice(bits);
        Ok(self)
    }

    /// Stores the low `bits` bits of an unsigned value, MSB first
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        self.store_big_uint(&BigUint::from(value), bits)
    }

    /// Stores an unsigned integer, failing when it needs more than `bits` bits
    pub fn store_big_uint(&mut self, value: &BigUint, bits: usize) -> Result<&mut Self> {
        let encoded = Bits::from_biguint(value, bits)?;
        self.store_bits(&encoded)
    }

    /// Stores a signed integer in two's complement
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        self.store_big_int(&BigInt::from(value), bits)
    }

    /// Stores a signed integer, failing outside of `[-2^(bits-1), 2^(bits-1))`
    pub fn store_big_int(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        let overflow = || TvmError::IntOverflow {
            value: value.to_string(),
            bits,
        };
        if bits == 0 {
            return if value.is_zero() {
                Ok(self)
            } else {
                Err(overflow())
            };
        }
        let bound = BigInt::from(1u8) << (bits - 1);
        if *value < -&bound || *value >= bound {
            return Err(overflow());
        }
        let unsigned = if value.is_negative() {
            value + (BigInt::from(1u8) << bits)
        } else {
            value.clone()
        };
        let magnitude = unsigned.to_biguint().ok_or_else(overflow)?;
        self.store_big_uint(&magnitude, bits)
    }

    /// Stores `VarUInteger length`: a byte-count prefix then the value bytes
    pub fn store_var_uint(&mut self, value: &BigUint, length: usize) -> Result<&mut Self> {
        let prefix = var_prefix_bits(length);
        let size_bytes = (value.bits() as usize).div_ceil(8);
        if size_bytes >= 1 << prefix {
            return Err(TvmError::IntOverflow {
                value: value.to_string(),
                bits: ((1 << prefix) - 1) * 8,
            });
        }
        self.check_bits_overflow(prefix + size_bytes * 8)?;
        self.store_uint(size_bytes as u64, prefix)?;
        self.store_big_uint(value, size_bytes * 8)
    }

    /// Stores `VarInteger length`: a byte-count prefix then the two's complement bytes
    pub fn store_var_int(&mut self, value: &BigInt, length: usize) -> Result<&mut Self> {
        let prefix = var_prefix_bits(length);
        let size_bytes = signed_byte_len(value);
        if size_bytes >= 1 << prefix {
            return Err(TvmError::IntOverflow {
                value: value.to_string(),
                bits: ((1 << prefix) - 1) * 8,
            });
        }
        self.check_bits_overflow(prefix + size_bytes * 8)?;
        self.store_uint(size_bytes as u64, prefix)?;
        self.store_big_int(value, size_bytes * 8)
    }

    /// Stores coins as `VarUInteger 16`
    pub fn store_coins(&mut self, coins: &Coins) -> Result<&mut Self> {
        let nano = coins.nano_value();
        if nano.sign() == Sign::Minus {
            return Err(TvmError::NegativeCoins);
        }
        let magnitude = nano.magnitude().clone();
        self.store_var_uint(&magnitude, 16)
    }

    /// Stores a standard address or `addr_none`
    pub fn store_address(&mut self, address: Option<&Address>) -> Result<&mut Self> {
        match address {
            None => self.store_bits(&[false, false]),
            Some(addr) => {
                // addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256
                self.check_bits_overflow(2 + 1 + 8 + 256)?;
                self.store_bits(&[true, false])?;
                self.store_bit(false)?;
                self.store_int(addr.workchain as i64, 8)?;
                self.store_bytes(&addr.hash_part)
            }
        }
    }

    /// Stores multiple bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.check_bits_overflow(bytes.len() * 8)?;
        self.bits.extend(Bits::from_bytes(bytes).iter());
        Ok(self)
    }

    /// Stores the UTF-8 bytes of a string
    pub fn store_string(&mut self, s: &str) -> Result<&mut Self> {
        self.store_bytes(s.as_bytes())
    }

    /// Stores the unread bits and refs of a slice
    pub fn store_slice(&mut self, slice: &CellSlice) -> Result<&mut Self> {
        self.check_bits_overflow(slice.remaining_bits())?;
        self.check_refs_overflow(slice.remaining_refs())?;
        self.bits.extend_from_slice(slice.bits());
        self.refs.extend(slice.refs().iter().cloned());
        Ok(self)
    }

    /// Adds a reference to another cell
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<&mut Self> {
        self.check_refs_overflow(1)?;
        self.refs.push(cell);
        Ok(self)
    }

    pub fn store_refs(&mut self, cells: &[Arc<Cell>]) -> Result<&mut Self> {
        self.check_refs_overflow(cells.len())?;
        self.refs.extend(cells.iter().cloned());
        Ok(self)
    }

    /// Stores an optional reference (Maybe ^Cell)
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> Result<&mut Self> {
        match cell {
            Some(c) => {
                self.check_bits_overflow(1)?;
                self.check_refs_overflow(1)?;
                self.store_bit(true)?;
                self.store_ref(c)
            }
            None => self.store_bit(false),
        }
    }

    /// Stores a serialized dictionary, or a single `0` bit for an empty one
    ///
    /// The dictionary cell content is copied inline, so it must already carry
    /// its own presence bit (as produced by a `HashmapE`).
    pub fn store_dict(&mut self, dict: Option<&Cell>) -> Result<&mut Self> {
        match dict {
            Some(cell) => self.store_slice(&cell.parse()),
            None => self.store_bit(false),
        }
    }

    /// Builds an ordinary cell
    pub fn build(self) -> Result<Arc<Cell>> {
        self.build_as(CellType::Ordinary)
    }

    /// Builds a cell of the given type, running its validation
    pub fn build_as(self, cell_type: CellType) -> Result<Arc<Cell>> {
        Ok(Arc::new(Cell::new(self.bits, self.refs, cell_type)?))
    }

    /// Converts to a slice
    pub fn to_slice(self) -> Result<CellSlice> {
        Ok(self.build()?.parse())
    }
}

impl Default for CellBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Width of the byte-count prefix of `VarUInteger length`
pub(crate) fn var_prefix_bits(length: usize) -> usize {
    if length <= 1 {
        return 0;
    }
    (usize::BITS - (length - 1).leading_zeros()) as usize
}

/// Smallest number of bytes holding `value` in two's complement
fn signed_byte_len(value: &BigInt) -> usize {
    if value.is_zero() {
        return 0;
    }
    let mut bytes = 1;
    loop {
        let bound = BigInt::from(1u8) << (bytes * 8 - 1);
        if *value >= -&bound && *value < bound {
            return bytes;
        }
        bytes += 1;
    }
}
