//! Cell implementation for TON blockchain
//!
//! A cell is a fundamental data structure in TON that can store up to 1023 bits
//! of data and maintain up to 4 references to other cells. Cells are immutable:
//! type validation, level mask and per-level hashes/depths are all computed once
//! in [`Cell::new`].

use crate::tvm::bits::Bits;
use crate::tvm::error::{Result, TvmError};
use crate::tvm::mask::LevelMask;
use crate::tvm::slice::CellSlice;
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Maximum number of bits a cell can store
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have
pub const MAX_CELL_REFS: usize = 4;

/// Cell level range (0-3)
pub const MAX_CELL_LEVEL: u8 = 3;

/// Depth limit for a cell tree
pub const MAX_CELL_DEPTH: u16 = 1024;

const HASH_BITS: usize = 256;
const DEPTH_BITS: usize = 16;

/// Kind of a cell, stored as the first byte of exotic cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellType {
    #[default]
    Ordinary,
    PrunedBranch,
    LibraryReference,
    MerkleProof,
    MerkleUpdate,
}

impl CellType {
    /// Type tag; ordinary cells use -1 which is never serialized
    pub fn tag(self) -> i8 {
        match self {
            Self::Ordinary => -1,
            Self::PrunedBranch => 1,
            Self::LibraryReference => 2,
            Self::MerkleProof => 3,
            Self::MerkleUpdate => 4,
        }
    }

    pub fn from_tag(tag: i8) -> Option<Self> {
        match tag {
            -1 => Some(Self::Ordinary),
            1 => Some(Self::PrunedBranch),
            2 => Some(Self::LibraryReference),
            3 => Some(Self::MerkleProof),
            4 => Some(Self::MerkleUpdate),
            _ => None,
        }
    }

    pub fn is_exotic(self) -> bool {
        self != Self::Ordinary
    }

    pub fn is_merkle(self) -> bool {
        matches!(self, Self::MerkleProof | Self::MerkleUpdate)
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ordinary => "ordinary",
            Self::PrunedBranch => "pruned-branch",
            Self::LibraryReference => "library-reference",
            Self::MerkleProof => "merkle-proof",
            Self::MerkleUpdate => "merkle-update",
        };
        f.write_str(name)
    }
}

/// Represents a cell in the TON blockchain
#[derive(Debug, Clone)]
pub struct Cell {
    bits: Bits,
    refs: Vec<Arc<Cell>>,
    cell_type: CellType,
    mask: LevelMask,
    hashes: Vec<[u8; 32]>,
    depths: Vec<u16>,
}

impl Cell {
    /// Validates the content against its type and computes hashes and depths
    pub fn new(bits: Bits, refs: Vec<Arc<Cell>>, cell_type: CellType) -> Result<Self> {
        let mask = match cell_type {
            CellType::Ordinary => validate_ordinary(&bits, &refs)?,
            CellType::PrunedBranch => validate_pruned_branch(&bits, &refs)?,
            CellType::LibraryReference => validate_library(&bits, &refs)?,
            CellType::MerkleProof => validate_merkle_proof(&bits, &refs)?,
            CellType::MerkleUpdate => validate_merkle_update(&bits, &refs)?,
        };

        let mut cell = Self {
            bits,
            refs,
            cell_type,
            mask,
            hashes: Vec::new(),
            depths: Vec::new(),
        };
        cell.compute_hashes()?;
        Ok(cell)
    }

    /// Creates an ordinary cell
    pub fn ordinary(bits: Bits, refs: Vec<Arc<Cell>>) -> Result<Self> {
        Self::new(bits, refs, CellType::Ordinary)
    }

    /// Creates a level-1 pruned branch standing in for `cell`
    pub fn pruned_branch(cell: &Cell) -> Result<Self> {
        if cell.level() != 0 {
            return Err(TvmError::InvalidCell(
                "only level 0 cells can be pruned".to_string(),
            ));
        }
        let mut bits = Bits::with_capacity(8 + 8 + HASH_BITS + DEPTH_BITS);
        push_uint(&mut bits, CellType::PrunedBranch.tag() as u8 as u64, 8);
        push_uint(&mut bits, 1, 8);
        bits.extend(Bits::from_bytes(&cell.hash_at(0)).iter());
        push_uint(&mut bits, cell.depth_at(0) as u64, DEPTH_BITS);
        Self::new(bits, Vec::new(), CellType::PrunedBranch)
    }

    /// Wraps `root` into a Merkle proof cell
    pub fn merkle_proof(root: Arc<Cell>) -> Result<Self> {
        let mut bits = Bits::with_capacity(8 + HASH_BITS + DEPTH_BITS);
        push_uint(&mut bits, CellType::MerkleProof.tag() as u8 as u64, 8);
        bits.extend(Bits::from_bytes(&root.hash_at(0)).iter());
        push_uint(&mut bits, root.depth_at(0) as u64, DEPTH_BITS);
        Self::new(bits, vec![root], CellType::MerkleProof)
    }

    /// Wraps two proofs into a Merkle update cell
    pub fn merkle_update(old: Arc<Cell>, new: Arc<Cell>) -> Result<Self> {
        let mut bits = Bits::with_capacity(8 + 2 * (HASH_BITS + DEPTH_BITS));
        push_uint(&mut bits, CellType::MerkleUpdate.tag() as u8 as u64, 8);
        bits.extend(Bits::from_bytes(&old.hash_at(0)).iter());
        bits.extend(Bits::from_bytes(&new.hash_at(0)).iter());
        push_uint(&mut bits, old.depth_at(0) as u64, DEPTH_BITS);
        push_uint(&mut bits, new.depth_at(0) as u64, DEPTH_BITS);
        Self::new(bits, vec![old, new], CellType::MerkleUpdate)
    }

    pub fn bits(&self) -> &Bits {
        &self.bits
    }

    /// Returns the number of bits in the cell
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Returns the cell's references
    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    /// Gets a reference by index
    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.refs.get(index)
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Returns whether this is an exotic cell
    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    pub fn mask(&self) -> LevelMask {
        self.mask
    }

    /// Returns the cell's level
    pub fn level(&self) -> u8 {
        self.mask.level()
    }

    /// Representation hash at the highest level
    pub fn hash(&self) -> [u8; 32] {
        self.hash_at(MAX_CELL_LEVEL)
    }

    /// Hash of the cell as seen at `level`
    pub fn hash_at(&self, level: u8) -> [u8; 32] {
        let hash_index = self.mask.apply(level).hash_index();
        if self.cell_type == CellType::PrunedBranch {
            let this_hash_index = self.mask.hash_index();
            if hash_index != this_hash_index {
                let offset = 16 + hash_index * HASH_BITS;
                let mut hash = [0u8; 32];
                for (i, byte) in hash.iter_mut().enumerate() {
                    *byte = read_uint(&self.bits[offset + i * 8..], 8) as u8;
                }
                return hash;
            }
            return self.hashes[0];
        }
        self.hashes[hash_index]
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Depth at the highest level
    pub fn depth(&self) -> u16 {
        self.depth_at(MAX_CELL_LEVEL)
    }

    /// Depth of the cell as seen at `level`
    pub fn depth_at(&self, level: u8) -> u16 {
        let hash_index = self.mask.apply(level).hash_index();
        if self.cell_type == CellType::PrunedBranch {
            let this_hash_index = self.mask.hash_index();
            if hash_index != this_hash_index {
                let offset = 16 + this_hash_index * HASH_BITS + hash_index * DEPTH_BITS;
                return read_uint(&self.bits[offset..], DEPTH_BITS) as u16;
            }
            return self.depths[0];
        }
        self.depths[hash_index]
    }

    /// refs + 8 * exotic + 32 * mask
    pub fn refs_descriptor(&self, mask: LevelMask) -> u8 {
        self.refs.len() as u8 + if self.is_exotic() { 8 } else { 0 } + mask.value() * 32
    }

    /// ceil(bits / 8) + floor(bits / 8)
    pub fn bits_descriptor(&self) -> u8 {
        let len = self.bits.len();
        (len.div_ceil(8) + len / 8) as u8
    }

    /// Data bits padded to a byte boundary
    pub fn augmented_bytes(&self) -> Result<Vec<u8>> {
        self.bits.augment(8).to_bytes()
    }

    /// Copies the cell content into a fresh slice
    pub fn parse(&self) -> CellSlice {
        CellSlice::new(self.bits.clone(), self.refs.clone())
    }

    pub fn slice(&self) -> CellSlice {
        self.parse()
    }

    /// Prints the tree in fift-hex notation, one cell per line
    pub fn to_fift_hex(&self) -> Result<String> {
        let mut output = String::new();
        self.write_fift_hex(&mut output, 0)?;
        Ok(output)
    }

    fn write_fift_hex(&self, output: &mut String, indent: usize) -> Result<()> {
        let aligned = self.bits.len() % 4 == 0;
        let hex = self.bits.augment(4).to_hex()?;
        output.push_str(&" ".repeat(indent));
        output.push_str("x{");
        output.push_str(&hex);
        if !aligned {
            output.push('_');
        }
        output.push_str("}\n");
        for reference in &self.refs {
            reference.write_fift_hex(output, indent + 1)?;
        }
        Ok(())
    }

    fn compute_hashes(&mut self) -> Result<()> {
        let total_hash_count = self.mask.hash_count();
        let hash_count = if self.cell_type == CellType::PrunedBranch {
            1
        } else {
            total_hash_count
        };
        let hash_index_offset = total_hash_count - hash_count;
        let mut hash_index = 0;

        for level in 0..=self.mask.level() {
            if !self.mask.is_significant(level) {
                continue;
            }
            if hash_index < hash_index_offset {
                hash_index += 1;
                continue;
            }

            let ref_level = if self.cell_type.is_merkle() {
                level + 1
            } else {
                level
            };

            let mut hasher = Sha256::new();
            hasher.update([
                self.refs_descriptor(self.mask.apply(level)),
                self.bits_descriptor(),
            ]);
            if hash_index == hash_index_offset {
                hasher.update(self.augmented_bytes()?);
            } else {
                hasher.update(self.hashes[hash_index - hash_index_offset - 1]);
            }

            let mut depth = 0;
            for reference in &self.refs {
                let child_depth = reference.depth_at(ref_level);
                hasher.update(child_depth.to_be_bytes());
                let next = child_depth
                    .checked_add(1)
                    .ok_or(TvmError::DepthOverflow(child_depth))?;
                depth = depth.max(next);
            }
            if depth >= MAX_CELL_DEPTH {
                return Err(TvmError::DepthOverflow(depth));
            }
            for reference in &self.refs {
                hasher.update(reference.hash_at(ref_level));
            }

            self.hashes.push(hasher.finalize().into());
            self.depths.push(depth);
            hash_index += 1;
        }

        Ok(())
    }
}

impl Default for Cell {
    fn default() -> Self {
        // refs and bits descriptors are both zero, with no data after them
        Self {
            bits: Bits::new(),
            refs: Vec::new(),
            cell_type: CellType::Ordinary,
            mask: LevelMask::default(),
            hashes: vec![Sha256::digest([0u8, 0u8]).into()],
            depths: vec![0],
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&Cell::hash(self));
    }
}

fn push_uint(bits: &mut Bits, value: u64, size: usize) {
    for i in (0..size).rev() {
        bits.push((value >> i) & 1 == 1);
    }
}

fn read_uint(bits: &[bool], size: usize) -> u64 {
    bits[..size]
        .iter()
        .fold(0u64, |acc, bit| (acc << 1) | *bit as u64)
}

fn check_tag(bits: &Bits, expected: CellType) -> Result<()> {
    if bits.len() < 8 {
        return Err(TvmError::InvalidCell(format!(
            "{expected} cell must contain a type tag"
        )));
    }
    let tag = read_uint(bits, 8) as u8 as i8;
    if tag != expected.tag() {
        return Err(TvmError::InvalidCell(format!(
            "{expected} cell has type tag {tag}"
        )));
    }
    Ok(())
}

fn validate_ordinary(bits: &Bits, refs: &[Arc<Cell>]) -> Result<LevelMask> {
    if bits.len() > MAX_CELL_BITS {
        return Err(TvmError::InvalidCell(format!(
            "ordinary cell can not hold {} bits",
            bits.len()
        )));
    }
    if refs.len() > MAX_CELL_REFS {
        return Err(TvmError::RefsOverflow);
    }
    Ok(refs
        .iter()
        .fold(LevelMask::default(), |mask, reference| mask | reference.mask()))
}

fn validate_pruned_branch(bits: &Bits, refs: &[Arc<Cell>]) -> Result<LevelMask> {
    let min_size = 8 + 8 + HASH_BITS + DEPTH_BITS;
    if bits.len() < min_size {
        return Err(TvmError::InvalidCell(format!(
            "pruned branch must have at least {min_size} bits, got {}",
            bits.len()
        )));
    }
    if !refs.is_empty() {
        return Err(TvmError::InvalidCell(
            "pruned branch can not have refs".to_string(),
        ));
    }
    check_tag(bits, CellType::PrunedBranch)?;

    let mask = LevelMask::new(read_uint(&bits[8..], 8) as u8);
    let level = mask.level();
    if !(1..=MAX_CELL_LEVEL).contains(&level) {
        return Err(TvmError::InvalidCell(format!(
            "pruned branch has level {level}"
        )));
    }
    let hash_count = mask.apply(level - 1).hash_count();
    let expected = 8 + 8 + hash_count * (HASH_BITS + DEPTH_BITS);
    if bits.len() != expected {
        return Err(TvmError::InvalidCell(format!(
            "pruned branch must have exactly {expected} bits, got {}",
            bits.len()
        )));
    }
    for i in 0..hash_count {
        let offset = 16 + hash_count * HASH_BITS + i * DEPTH_BITS;
        let depth = read_uint(&bits[offset..], DEPTH_BITS);
        if depth >= MAX_CELL_DEPTH as u64 {
            return Err(TvmError::DepthOverflow(depth as u16));
        }
    }
    Ok(mask)
}

fn validate_library(bits: &Bits, refs: &[Arc<Cell>]) -> Result<LevelMask> {
    let size = 8 + HASH_BITS;
    if bits.len() != size {
        return Err(TvmError::InvalidCell(format!(
            "library reference must have exactly {size} bits, got {}",
            bits.len()
        )));
    }
    if !refs.is_empty() {
        return Err(TvmError::InvalidCell(
            "library reference can not have refs".to_string(),
        ));
    }
    check_tag(bits, CellType::LibraryReference)?;
    Ok(LevelMask::default())
}

fn check_proof(bits: &Bits, offset: usize, depth_offset: usize, proof: &Cell) -> Result<()> {
    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = read_uint(&bits[offset + i * 8..], 8) as u8;
    }
    if hash != proof.hash_at(0) {
        return Err(TvmError::InvalidCell(
            "merkle cell hash does not match its ref".to_string(),
        ));
    }
    let depth = read_uint(&bits[depth_offset..], DEPTH_BITS) as u16;
    if depth != proof.depth_at(0) {
        return Err(TvmError::InvalidCell(
            "merkle cell depth does not match its ref".to_string(),
        ));
    }
    Ok(())
}

fn validate_merkle_proof(bits: &Bits, refs: &[Arc<Cell>]) -> Result<LevelMask> {
    let size = 8 + HASH_BITS + DEPTH_BITS;
    if bits.len() != size {
        return Err(TvmError::InvalidCell(format!(
            "merkle proof must have exactly {size} bits, got {}",
            bits.len()
        )));
    }
    if refs.len() != 1 {
        return Err(TvmError::InvalidCell(
            "merkle proof must have exactly one ref".to_string(),
        ));
    }
    check_tag(bits, CellType::MerkleProof)?;
    check_proof(bits, 8, 8 + HASH_BITS, &refs[0])?;
    Ok(refs[0].mask() >> 1)
}

fn validate_merkle_update(bits: &Bits, refs: &[Arc<Cell>]) -> Result<LevelMask> {
    let size = 8 + 2 * (HASH_BITS + DEPTH_BITS);
    if bits.len() != size {
        return Err(TvmError::InvalidCell(format!(
            "merkle update must have exactly {size} bits, got {}",
            bits.len()
        )));
    }
    if refs.len() != 2 {
        return Err(TvmError::InvalidCell(
            "merkle update must have exactly two refs".to_string(),
        ));
    }
    check_tag(bits, CellType::MerkleUpdate)?;
    check_proof(bits, 8, 8 + 2 * HASH_BITS, &refs[0])?;
    check_proof(bits, 8 + HASH_BITS, 8 + 2 * HASH_BITS + DEPTH_BITS, &refs[1])?;
    Ok((refs[0].mask() | refs[1].mask()) >> 1)
}
