//! Bag of Cells (BoC) serialization and deserialization
//!
//! BoC is a serialization format that encodes a forest of cells into a byte
//! array. Cells are written in topological order (every cell after all of its
//! parents), each as `d1 d2 data ref_indices`, behind a header that records
//! the widths of indices and offsets, the root list and an optional index.
//! The standard layout may end with a CRC32C of everything before it.

use crate::crc::CRC32C;
use crate::tvm::bits::Bits;
use crate::tvm::cell::{Cell, CellType, MAX_CELL_REFS};
use crate::tvm::error::{Result, TvmError};
use crate::tvm::mask::LevelMask;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// BoC magic number for standard format
const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// BoC magic number for lean indexed format
const BOC_INDEXED_MAGIC: u32 = 0x68ff65f3;

/// BoC magic number for lean indexed format with CRC32C
const BOC_INDEXED_CRC32C_MAGIC: u32 = 0xacc3a728;

/// Order in which cells are laid out by [`serialize`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologicalOrder {
    #[default]
    BreadthFirst,
    DepthFirst,
}

/// Options of the serialized bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BocOptions {
    /// Write the per-cell offset index
    pub has_index: bool,
    /// Append a CRC32C of the whole bag
    pub hash_crc32: bool,
    /// Mark index entries as cacheable (requires the index)
    pub has_cache_bits: bool,
    pub topological_order: TopologicalOrder,
    /// Two user flag bits stored in the header
    pub flags: u8,
}

impl Default for BocOptions {
    fn default() -> Self {
        Self {
            has_index: false,
            hash_crc32: true,
            has_cache_bits: false,
            topological_order: TopologicalOrder::BreadthFirst,
            flags: 0,
        }
    }
}

/// Parsed BoC header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BocHeader {
    pub has_index: bool,
    pub hash_crc32: bool,
    pub has_cache_bits: bool,
    pub flags: u8,
    pub size_bytes: usize,
    pub offset_bytes: usize,
    pub cells_num: usize,
    pub roots_num: usize,
    pub absent_num: usize,
    pub tot_cells_size: usize,
    pub root_list: Vec<usize>,
    pub cells_data: Vec<u8>,
}

/// A decoded cell whose references are still indices into the bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPointer {
    pub cell_type: CellType,
    pub mask: LevelMask,
    pub bits: Bits,
    pub refs: Vec<usize>,
}

/// Result of [`deserialize_cell`]: the cell and the bytes following it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellData<'a> {
    pub pointer: CellPointer,
    pub remainder: &'a [u8],
}

/// Big-endian reader over a byte buffer
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, size: usize) -> Result<&'a [u8]> {
        if size > self.remaining() {
            return Err(TvmError::InvalidBoc(format!(
                "unexpected end of data: need {size} bytes, {} left",
                self.remaining()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + size];
        self.pos += size;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_uint(&mut self, size: usize) -> Result<usize> {
        Ok(self
            .read_bytes(size)?
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | *byte as usize))
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// Serializes a forest of cells into a bag
pub fn serialize(roots: &[Arc<Cell>], options: &BocOptions) -> Result<Vec<u8>> {
    if roots.is_empty() {
        return Err(TvmError::InvalidBoc("nothing to serialize".to_string()));
    }
    if options.has_cache_bits && !options.has_index {
        return Err(TvmError::InvalidBoc(
            "cache bits require the index".to_string(),
        ));
    }

    let cells = match options.topological_order {
        TopologicalOrder::BreadthFirst => breadth_first_order(roots),
        TopologicalOrder::DepthFirst => depth_first_order(roots),
    };
    let positions: HashMap<[u8; 32], usize> = cells
        .iter()
        .enumerate()
        .map(|(index, cell)| (cell.hash(), index))
        .collect();
    let position = |cell: &Arc<Cell>| {
        positions.get(&cell.hash()).copied().ok_or_else(|| {
            TvmError::InvalidBoc(format!("cell {} is missing from the order", cell.hash_hex()))
        })
    };

    let size_bytes = bytes_needed(cells.len());
    let mut payload = Vec::new();
    let mut index = Vec::with_capacity(cells.len());
    for cell in &cells {
        payload.push(cell.refs_descriptor(cell.mask()));
        payload.push(cell.bits_descriptor());
        payload.extend_from_slice(&cell.augmented_bytes()?);
        for reference in cell.refs() {
            write_uint(&mut payload, position(reference)?, size_bytes);
        }
        index.push(payload.len());
    }

    let max_offset = if options.has_cache_bits {
        payload.len() << 1
    } else {
        payload.len()
    };
    let offset_bytes = bytes_needed(max_offset);
    debug!(
        "serializing {} cells ({} roots, {} bytes), size_bytes={size_bytes}, offset_bytes={offset_bytes}",
        cells.len(),
        roots.len(),
        payload.len()
    );

    let mut result = Vec::with_capacity(payload.len() + 32);
    result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());
    let mut flags_byte = size_bytes as u8 | (options.flags & 3) << 3;
    if options.has_index {
        flags_byte |= 0x80;
    }
    if options.hash_crc32 {
        flags_byte |= 0x40;
    }
    if options.has_cache_bits {
        flags_byte |= 0x20;
    }
    result.push(flags_byte);
    result.push(offset_bytes as u8);
    write_uint(&mut result, cells.len(), size_bytes);
    write_uint(&mut result, roots.len(), size_bytes);
    write_uint(&mut result, 0, size_bytes);
    write_uint(&mut result, payload.len(), offset_bytes);
    for root in roots {
        write_uint(&mut result, position(root)?, size_bytes);
    }
    if options.has_index {
        for end in index {
            let entry = if options.has_cache_bits { end << 1 } else { end };
            write_uint(&mut result, entry, offset_bytes);
        }
    }
    result.extend_from_slice(&payload);

    if options.hash_crc32 {
        let crc = CRC32C.checksum(&result);
        result.extend_from_slice(&crc.to_le_bytes());
    }

    Ok(result)
}

/// Deserializes all roots of a bag
pub fn deserialize(data: &[u8]) -> Result<Vec<Arc<Cell>>> {
    deserialize_with(data, false)
}

/// Deserializes all roots, optionally requiring at least one Merkle cell
pub fn deserialize_with(data: &[u8], check_merkle_proofs: bool) -> Result<Vec<Arc<Cell>>> {
    let header = deserialize_header(data)?;

    let mut pointers = Vec::with_capacity(header.cells_num);
    let mut remainder = header.cells_data.as_slice();
    for _ in 0..header.cells_num {
        let CellData {
            pointer,
            remainder: rest,
        } = deserialize_cell(remainder, header.size_bytes)?;
        pointers.push(pointer);
        remainder = rest;
    }
    if !remainder.is_empty() {
        return Err(TvmError::InvalidBoc(format!(
            "{} bytes of cell data left unused",
            remainder.len()
        )));
    }

    let count = pointers.len();
    let mut cells: Vec<Option<Arc<Cell>>> = vec![None; count];
    let mut has_merkle = false;
    for (index, pointer) in pointers.into_iter().enumerate().rev() {
        let mut refs = Vec::with_capacity(pointer.refs.len());
        for &reference in &pointer.refs {
            if reference <= index {
                return Err(TvmError::TopologicalOrder {
                    cell: index,
                    reference,
                });
            }
            let child = cells
                .get(reference)
                .and_then(Clone::clone)
                .ok_or_else(|| {
                    TvmError::InvalidBoc(format!("cell {index} references missing cell {reference}"))
                })?;
            refs.push(child);
        }

        let cell = Cell::new(pointer.bits, refs, pointer.cell_type)?;
        if cell.mask() != pointer.mask {
            return Err(TvmError::InvalidBoc(format!(
                "cell {index} declares level mask {}, computed {}",
                pointer.mask.value(),
                cell.mask().value()
            )));
        }
        has_merkle |= cell.cell_type().is_merkle();
        cells[index] = Some(Arc::new(cell));
    }

    if check_merkle_proofs && !has_merkle {
        return Err(TvmError::InvalidBoc(
            "bag does not contain Merkle proofs".to_string(),
        ));
    }

    header
        .root_list
        .iter()
        .map(|&root| {
            cells
                .get(root)
                .and_then(Clone::clone)
                .ok_or_else(|| TvmError::InvalidBoc(format!("root index {root} is out of range")))
        })
        .collect()
}

/// Parses the header, validates the checksum and isolates the cell data
pub fn deserialize_header(data: &[u8]) -> Result<BocHeader> {
    let mut reader = ByteReader::new(data);
    let magic = u32::from_be_bytes(
        reader
            .read_bytes(4)?
            .try_into()
            .map_err(|_| TvmError::InvalidBoc("bad magic".to_string()))?,
    );

    let (has_index, hash_crc32, has_cache_bits, flags, size_bytes) = match magic {
        BOC_GENERIC_MAGIC => {
            let byte = reader.read_u8()?;
            (
                byte & 0x80 != 0,
                byte & 0x40 != 0,
                byte & 0x20 != 0,
                (byte >> 3) & 3,
                (byte & 7) as usize,
            )
        }
        BOC_INDEXED_MAGIC => (true, false, false, 0, reader.read_u8()? as usize),
        BOC_INDEXED_CRC32C_MAGIC => (true, true, false, 0, reader.read_u8()? as usize),
        other => {
            return Err(TvmError::InvalidBoc(format!(
                "unknown magic 0x{other:08x}"
            )));
        }
    };
    if !(1..=8).contains(&size_bytes) {
        return Err(TvmError::InvalidBoc(format!("invalid size_bytes {size_bytes}")));
    }

    let offset_bytes = reader.read_u8()? as usize;
    if !(1..=8).contains(&offset_bytes) {
        return Err(TvmError::InvalidBoc(format!(
            "invalid offset_bytes {offset_bytes}"
        )));
    }

    let cells_num = reader.read_uint(size_bytes)?;
    let roots_num = reader.read_uint(size_bytes)?;
    let absent_num = reader.read_uint(size_bytes)?;
    let tot_cells_size = reader.read_uint(offset_bytes)?;
    if roots_num > cells_num {
        return Err(TvmError::InvalidBoc(format!(
            "{roots_num} roots for {cells_num} cells"
        )));
    }
    if absent_num != 0 {
        return Err(TvmError::InvalidBoc("absent cells are not supported".to_string()));
    }
    // every cell takes at least its two descriptor bytes
    if cells_num > tot_cells_size / 2 {
        return Err(TvmError::InvalidBoc(format!(
            "{cells_num} cells do not fit into {tot_cells_size} bytes of data"
        )));
    }
    let root_list_len = roots_num
        .checked_mul(size_bytes)
        .filter(|len| *len <= reader.remaining())
        .ok_or_else(|| {
            TvmError::InvalidBoc(format!("root list of {roots_num} entries exceeds the data"))
        })?;
    if tot_cells_size > reader.remaining() - root_list_len {
        return Err(TvmError::InvalidBoc(format!(
            "cell data of {tot_cells_size} bytes exceeds the data"
        )));
    }

    let mut root_list = Vec::with_capacity(roots_num);
    for _ in 0..roots_num {
        root_list.push(reader.read_uint(size_bytes)?);
    }
    if has_index {
        let index_len = cells_num.checked_mul(offset_bytes).ok_or_else(|| {
            TvmError::InvalidBoc(format!("index of {cells_num} cells is too large"))
        })?;
        reader.read_bytes(index_len)?;
    }
    let cells_data = reader.read_bytes(tot_cells_size)?.to_vec();

    if hash_crc32 {
        let checked = reader.pos;
        let stored = reader.read_bytes(4)?;
        let expected = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        let actual = CRC32C.checksum(&data[..checked]);
        if expected != actual {
            return Err(TvmError::CrcMismatch { expected, actual });
        }
    }
    if reader.remaining() != 0 {
        return Err(TvmError::InvalidBoc(format!(
            "{} trailing bytes after the bag",
            reader.remaining()
        )));
    }

    debug!(
        "bag header: {cells_num} cells, {roots_num} roots, {tot_cells_size} bytes of data, \
         size_bytes={size_bytes}, offset_bytes={offset_bytes}, index={has_index}, crc={hash_crc32}"
    );

    Ok(BocHeader {
        has_index,
        hash_crc32,
        has_cache_bits,
        flags,
        size_bytes,
        offset_bytes,
        cells_num,
        roots_num,
        absent_num,
        tot_cells_size,
        root_list,
        cells_data,
    })
}

/// Decodes one serialized cell from the front of `data`
pub fn deserialize_cell(data: &[u8], ref_index_size: usize) -> Result<CellData<'_>> {
    let mut reader = ByteReader::new(data);
    let refs_descriptor = reader.read_u8()?;
    let ref_count = (refs_descriptor & 7) as usize;
    let is_exotic = refs_descriptor & 8 != 0;
    let has_hashes = refs_descriptor & 16 != 0;
    let mask = LevelMask::new(refs_descriptor >> 5);

    if ref_count == 7 && has_hashes {
        return Err(TvmError::InvalidBoc("absent cells are not supported".to_string()));
    }
    if ref_count > MAX_CELL_REFS {
        return Err(TvmError::InvalidBoc(format!(
            "cell has {ref_count} refs"
        )));
    }

    let bits_descriptor = reader.read_u8()? as usize;
    let augmented = bits_descriptor % 2 == 1;
    let byte_len = bits_descriptor.div_ceil(2);

    if has_hashes {
        // stored hashes and depths are recomputed on construction
        reader.read_bytes(mask.hash_count() * (32 + 2))?;
    }

    let mut bits = Bits::from_bytes(reader.read_bytes(byte_len)?);
    if augmented {
        bits.rollback_in_place()?;
    }

    let cell_type = if is_exotic {
        if bits.len() < 8 {
            return Err(TvmError::InvalidBoc(
                "exotic cell without a type tag".to_string(),
            ));
        }
        let tag = bits[..8].iter().fold(0u8, |acc, bit| (acc << 1) | *bit as u8) as i8;
        match CellType::from_tag(tag) {
            Some(CellType::Ordinary) | None => {
                return Err(TvmError::InvalidBoc(format!(
                    "exotic cell has invalid type tag {tag}"
                )));
            }
            Some(cell_type) => cell_type,
        }
    } else {
        CellType::Ordinary
    };

    let mut refs = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        refs.push(reader.read_uint(ref_index_size)?);
    }
    trace!(
        "cell {cell_type}: {} bits, refs {refs:?}, mask {}",
        bits.len(),
        mask.value()
    );

    Ok(CellData {
        pointer: CellPointer {
            cell_type,
            mask,
            bits,
            refs,
        },
        remainder: reader.rest(),
    })
}

/// Children are placed only after all of their parents, roots first
fn breadth_first_order(roots: &[Arc<Cell>]) -> Vec<Arc<Cell>> {
    let mut unique: HashMap<[u8; 32], Arc<Cell>> = HashMap::new();
    let mut parents: HashMap<[u8; 32], usize> = HashMap::new();
    let mut queue: VecDeque<Arc<Cell>> = roots.iter().cloned().collect();
    while let Some(cell) = queue.pop_front() {
        if unique.insert(cell.hash(), cell.clone()).is_some() {
            continue;
        }
        for reference in cell.refs() {
            *parents.entry(reference.hash()).or_default() += 1;
            queue.push_back(reference.clone());
        }
    }

    let mut order = Vec::with_capacity(unique.len());
    let mut placed = HashSet::new();
    let mut ready: VecDeque<Arc<Cell>> = roots
        .iter()
        .filter(|root| !parents.contains_key(&root.hash()))
        .cloned()
        .collect();
    while let Some(cell) = ready.pop_front() {
        if !placed.insert(cell.hash()) {
            continue;
        }
        for reference in cell.refs() {
            if let Some(count) = parents.get_mut(&reference.hash()) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(reference.clone());
                }
            }
        }
        order.push(cell);
    }
    order
}

/// Reverse post-order of a depth-first walk, roots first
fn depth_first_order(roots: &[Arc<Cell>]) -> Vec<Arc<Cell>> {
    let mut visited = HashSet::new();
    let mut post_order = Vec::new();
    for root in roots.iter().rev() {
        if !visited.insert(root.hash()) {
            continue;
        }
        let mut stack: Vec<(Arc<Cell>, usize)> = vec![(root.clone(), 0)];
        while let Some((cell, next)) = stack.pop() {
            let refs = cell.refs();
            if next < refs.len() {
                // last ref first, so the reversed order starts with ref 0
                let child = refs[refs.len() - 1 - next].clone();
                stack.push((cell, next + 1));
                if visited.insert(child.hash()) {
                    stack.push((child, 0));
                }
            } else {
                post_order.push(cell);
            }
        }
    }
    post_order.reverse();
    post_order
}

/// Smallest byte width able to hold `value`, at least one
fn bytes_needed(value: usize) -> usize {
    let bits = (usize::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(8).max(1)
}

fn write_uint(buf: &mut Vec<u8>, value: usize, size: usize) {
    let bytes = (value as u64).to_be_bytes();
    buf.extend_from_slice(&bytes[8 - size..]);
}

fn first_root(data: &[u8]) -> Result<Arc<Cell>> {
    deserialize(data)?
        .into_iter()
        .next()
        .ok_or_else(|| TvmError::InvalidBoc("bag has no roots".to_string()))
}

/// Decodes a hex BoC and returns its first root
pub fn hex_to_boc(hex: &str) -> Result<Arc<Cell>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    first_root(&hex::decode(hex)?)
}

/// Serializes a single root with default options into hex
pub fn boc_to_hex(cell: &Arc<Cell>) -> Result<String> {
    let bytes = serialize(std::slice::from_ref(cell), &BocOptions::default())?;
    Ok(hex::encode(bytes))
}

/// Serializes a single root with default options into base64
pub fn boc_to_base64(cell: &Arc<Cell>) -> Result<String> {
    let bytes = serialize(std::slice::from_ref(cell), &BocOptions::default())?;
    Ok(STANDARD.encode(bytes))
}

/// Decodes a base64 BoC and returns its first root
pub fn base64_to_boc(b64: &str) -> Result<Arc<Cell>> {
    let bytes = STANDARD
        .decode(b64.trim())
        .map_err(|e| TvmError::InvalidBoc(format!("bad base64: {e}")))?;
    first_root(&bytes)
}
