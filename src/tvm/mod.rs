//! TVM (TON Virtual Machine) data structures and utilities
//!
//! This module provides implementations of fundamental TON blockchain data structures:
//! - Cell: up to 1023 bits and 4 references, with per-level hashes and depths
//! - CellBuilder / CellSlice: bit-precise writer and reader for cell content
//! - BoC: Bag of Cells serialization format for encoding cells into byte arrays
//! - Hashmap: the patricia-trie dictionary stored in cells, with Merkle proofs
//! - Address and Coins: the most common values stored in cells

pub mod address;
pub mod bits;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod coins;
pub mod dict;
pub mod error;
pub mod fift;
pub mod mask;
pub mod slice;

pub use address::Address;
pub use bits::Bits;
pub use boc::{
    BocOptions, TopologicalOrder, base64_to_boc, boc_to_base64, boc_to_hex, hex_to_boc,
};
pub use builder::CellBuilder;
pub use cell::{Cell, CellType, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_LEVEL, MAX_CELL_REFS};
pub use coins::Coins;
pub use dict::{DictCodec, Hashmap, HashmapKind, RawCodec, UintCodec};
pub use error::{Result, TvmError};
pub use fift::deserialize_fift;
pub use mask::LevelMask;
pub use slice::CellSlice;
