//! Slice implementation for reading data from cells
//!
//! A [`CellSlice`] owns a copy of a cell's bits and refs and reads them
//! sequentially, tracking the current position in both. `load_*` methods
//! advance the cursor; `preload_*` methods decode the same value from a
//! clone and leave the cursor untouched.

use crate::tvm::address::Address;
use crate::tvm::bits::Bits;
use crate::tvm::builder::var_prefix_bits;
use crate::tvm::cell::Cell;
use crate::tvm::coins::Coins;
use crate::tvm::dict::{DictCodec, Hashmap, HashmapKind};
use crate::tvm::error::{Result, TvmError};
use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use std::sync::Arc;

/// A read cursor over cell content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellSlice {
    bits: Bits,
    refs: Vec<Arc<Cell>>,
    bit_pos: usize,
    ref_pos: usize,
}

impl CellSlice {
    /// Creates a new slice over the given content
    pub fn new(bits: Bits, refs: Vec<Arc<Cell>>) -> Self {
        Self {
            bits,
            refs,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// Unread bits
    pub fn bits(&self) -> &[bool] {
        &self.bits[self.bit_pos..]
    }

    /// Unread references
    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs[self.ref_pos..]
    }

    /// Returns the number of remaining bits
    pub fn remaining_bits(&self) -> usize {
        self.bits.len() - self.bit_pos
    }

    /// Returns the number of remaining references
    pub fn remaining_refs(&self) -> usize {
        self.refs.len() - self.ref_pos
    }

    /// Checks if there are any remaining bits or refs
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    fn check_bits_underflow(&self, size: usize) -> Result<()> {
        if size > self.remaining_bits() {
            return Err(TvmError::BitsUnderflow {
                requested: size,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn check_refs_underflow(&self, count: usize) -> Result<()> {
        if count > self.remaining_refs() {
            return Err(TvmError::RefsUnderflow);
        }
        Ok(())
    }

    pub fn skip_bits(&mut self, size: usize) -> Result<&mut Self> {
        self.check_bits_underflow(size)?;
        self.bit_pos += size;
        Ok(self)
    }

    pub fn skip_refs(&mut self, count: usize) -> Result<&mut Self> {
        self.check_refs_underflow(count)?;
        self.ref_pos += count;
        Ok(self)
    }

    /// Skips a `HashmapE`: the presence bit and, if set, its root ref
    pub fn skip_dict(&mut self) -> Result<&mut Self> {
        if self.load_bit()? {
            self.skip_refs(1)?;
        }
        Ok(self)
    }

    pub fn load_ref(&mut self) -> Result<Arc<Cell>> {
        let cell = self.preload_ref()?;
        self.ref_pos += 1;
        Ok(cell)
    }

    pub fn preload_ref(&self) -> Result<Arc<Cell>> {
        self.check_refs_underflow(1)?;
        Ok(self.refs[self.ref_pos].clone())
    }

    /// Loads an optional reference (Maybe ^Cell)
    pub fn load_maybe_ref(&mut self) -> Result<Option<Arc<Cell>>> {
        if self.load_bit()? {
            Ok(Some(self.load_ref()?))
        } else {
            Ok(None)
        }
    }

    pub fn preload_maybe_ref(&self) -> Result<Option<Arc<Cell>>> {
        self.clone().load_maybe_ref()
    }

    /// Loads a single bit
    pub fn load_bit(&mut self) -> Result<bool> {
        let bit = self.preload_bit()?;
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn preload_bit(&self) -> Result<bool> {
        self.check_bits_underflow(1)?;
        Ok(self.bits[self.bit_pos])
    }

    pub fn load_bits(&mut self, size: usize) -> Result<Bits> {
        let bits = self.preload_bits(size)?;
        self.bit_pos += size;
        Ok(bits)
    }

    pub fn preload_bits(&self, size: usize) -> Result<Bits> {
        self.check_bits_underflow(size)?;
        Ok(Bits::from(&self.bits[self.bit_pos..self.bit_pos + size]))
    }

    /// Loads an unsigned integer of up to 64 bits
    pub fn load_uint(&mut self, size: usize) -> Result<u64> {
        let value = self.preload_uint(size)?;
        self.bit_pos += size;
        Ok(value)
    }

    pub fn preload_uint(&self, size: usize) -> Result<u64> {
        self.preload_big_uint(size)?
            .to_u64()
            .ok_or_else(|| TvmError::IntOverflow {
                value: format!("uint{size}"),
                bits: 64,
            })
    }

    /// Loads a signed integer of up to 64 bits
    pub fn load_int(&mut self, size: usize) -> Result<i64> {
        let value = self.preload_int(size)?;
        self.bit_pos += size;
        Ok(value)
    }

    pub fn preload_int(&self, size: usize) -> Result<i64> {
        self.preload_big_int(size)?
            .to_i64()
            .ok_or_else(|| TvmError::IntOverflow {
                value: format!("int{size}"),
                bits: 64,
            })
    }

    pub fn load_big_uint(&mut self, size: usize) -> Result<BigUint> {
        Ok(self.load_bits(size)?.to_big_uint())
    }

    pub fn preload_big_uint(&self, size: usize) -> Result<BigUint> {
        Ok(self.preload_bits(size)?.to_big_uint())
    }

    pub fn load_big_int(&mut self, size: usize) -> Result<BigInt> {
        Ok(self.load_bits(size)?.to_big_int())
    }

    pub fn preload_big_int(&self, size: usize) -> Result<BigInt> {
        Ok(self.preload_bits(size)?.to_big_int())
    }

    /// Loads `VarUInteger length`
    pub fn load_var_uint(&mut self, length: usize) -> Result<BigUint> {
        let size_bytes = self.load_uint(var_prefix_bits(length))? as usize;
        self.load_big_uint(size_bytes * 8)
    }

    pub fn preload_var_uint(&self, length: usize) -> Result<BigUint> {
        self.clone().load_var_uint(length)
    }

    /// Loads `VarInteger length`
    pub fn load_var_int(&mut self, length: usize) -> Result<BigInt> {
        let size_bytes = self.load_uint(var_prefix_bits(length))? as usize;
        self.load_big_int(size_bytes * 8)
    }

    pub fn preload_var_int(&self, length: usize) -> Result<BigInt> {
        self.clone().load_var_int(length)
    }

    /// Loads coins and scales them to `decimals`
    pub fn load_coins(&mut self, decimals: u32) -> Result<Coins> {
        let nano = self.load_var_uint(16)?;
        Ok(Coins::from_nano_with_decimals(BigInt::from(nano), decimals))
    }

    pub fn preload_coins(&self, decimals: u32) -> Result<Coins> {
        self.clone().load_coins(decimals)
    }

    /// Loads multiple bytes
    pub fn load_bytes(&mut self, size: usize) -> Result<Vec<u8>> {
        self.load_bits(size * 8)?.to_bytes()
    }

    pub fn preload_bytes(&self, size: usize) -> Result<Vec<u8>> {
        self.preload_bits(size * 8)?.to_bytes()
    }

    /// Loads `size` bytes as UTF-8, or every remaining whole byte when `None`
    pub fn load_string(&mut self, size: Option<usize>) -> Result<String> {
        let size = size.unwrap_or(self.remaining_bits() / 8);
        Ok(String::from_utf8(self.load_bytes(size)?)?)
    }

    pub fn preload_string(&self, size: Option<usize>) -> Result<String> {
        self.clone().load_string(size)
    }

    /// Splits off `size` bits as a new ref-less slice
    pub fn load_slice(&mut self, size: usize) -> Result<CellSlice> {
        Ok(CellSlice::new(self.load_bits(size)?, Vec::new()))
    }

    pub fn preload_slice(&self, size: usize) -> Result<CellSlice> {
        Ok(CellSlice::new(self.preload_bits(size)?, Vec::new()))
    }

    /// Loads `MsgAddressInt` or `addr_none`
    pub fn load_address(&mut self) -> Result<Option<Address>> {
        let flag = self.preload_uint(2)? as u8;
        match flag {
            0b00 => {
                self.bit_pos += 2;
                Ok(None)
            }
            0b10 => {
                self.check_bits_underflow(2 + 1 + 8 + 256)?;
                self.bit_pos += 2;
                // anycast is not supported and always stored as zero
                self.skip_bits(1)?;
                let workchain = self.load_int(8)? as i8;
                let mut hash_part = [0u8; 32];
                hash_part.copy_from_slice(&self.load_bytes(32)?);
                let mut address = Address::new(workchain, hash_part);
                address.set_bounceable(false);
                Ok(Some(address))
            }
            other => Err(TvmError::InvalidAddressFlag(other)),
        }
    }

    pub fn preload_address(&self) -> Result<Option<Address>> {
        self.clone().load_address()
    }

    /// Loads a `HashmapE` with the given key size and codec
    pub fn load_dict<C: DictCodec>(&mut self, key_size: usize, codec: C) -> Result<Hashmap<C>> {
        if !self.load_bit()? {
            return Ok(Hashmap::with_codec(key_size, HashmapKind::HashmapE, codec));
        }
        let root = self.load_ref()?;
        let wrapped = CellSlice::new(Bits::from(vec![true]), vec![root]);
        Hashmap::parse_slice(key_size, HashmapKind::HashmapE, codec, wrapped)
    }

    pub fn preload_dict<C: DictCodec>(&self, key_size: usize, codec: C) -> Result<Hashmap<C>> {
        self.clone().load_dict(key_size, codec)
    }

    /// Counts `1` bits up to the first `0` or the end of data
    pub fn load_unary_length(&mut self) -> Result<usize> {
        let mut length = 0;
        while self.remaining_bits() > 0 && self.load_bit()? {
            length += 1;
        }
        Ok(length)
    }

    pub fn preload_unary_length(&self) -> Result<usize> {
        self.clone().load_unary_length()
    }
}

impl From<&Cell> for CellSlice {
    fn from(cell: &Cell) -> Self {
        cell.parse()
    }
}
