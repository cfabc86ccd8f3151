//! TON Dictionary (HashMap) implementation
//!
//! Dictionaries in TON are binary patricia tries stored in cells. Every edge
//! carries a label (one of the `hml_short`, `hml_long` or `hml_same`
//! encodings) followed either by the leaf value or by a fork with exactly
//! two child edges. `Hashmap` requires at least one entry, `HashmapE` adds a
//! presence bit in front of the root reference so that it can be empty.
//!
//! Entries are kept as serialized bit keys mapped to value cells; a
//! [`DictCodec`] bound at construction converts them from and to typed keys
//! and values.

use crate::tvm::bits::Bits;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::Cell;
use crate::tvm::error::{Result, TvmError};
use crate::tvm::slice::CellSlice;
use num_bigint::BigUint;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Converts typed keys and values from and to their stored form
pub trait DictCodec {
    type Key;
    type Value;

    fn serialize_key(&self, key: &Self::Key) -> Result<Bits>;
    fn serialize_value(&self, value: &Self::Value) -> Result<Arc<Cell>>;
    fn deserialize_key(&self, bits: &Bits) -> Result<Self::Key>;
    fn deserialize_value(&self, cell: &Arc<Cell>) -> Result<Self::Value>;
}

/// Keys are bit strings and values are cells, as stored
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl DictCodec for RawCodec {
    type Key = Bits;
    type Value = Arc<Cell>;

    fn serialize_key(&self, key: &Bits) -> Result<Bits> {
        Ok(key.clone())
    }

    fn serialize_value(&self, value: &Arc<Cell>) -> Result<Arc<Cell>> {
        Ok(value.clone())
    }

    fn deserialize_key(&self, bits: &Bits) -> Result<Bits> {
        Ok(bits.clone())
    }

    fn deserialize_value(&self, cell: &Arc<Cell>) -> Result<Arc<Cell>> {
        Ok(cell.clone())
    }
}

/// Fixed-width unsigned keys and values
///
/// Each value is stored as the only content of its leaf.
#[derive(Debug, Clone, Copy)]
pub struct UintCodec {
    key_size: usize,
    value_size: usize,
}

impl UintCodec {
    pub fn new(key_size: usize, value_size: usize) -> Self {
        Self {
            key_size,
            value_size,
        }
    }
}

impl DictCodec for UintCodec {
    type Key = BigUint;
    type Value = BigUint;

    fn serialize_key(&self, key: &BigUint) -> Result<Bits> {
        Bits::from_biguint(key, self.key_size)
    }

    fn serialize_value(&self, value: &BigUint) -> Result<Arc<Cell>> {
        let mut builder = CellBuilder::new();
        builder.store_big_uint(value, self.value_size)?;
        builder.build()
    }

    fn deserialize_key(&self, bits: &Bits) -> Result<BigUint> {
        Ok(bits.to_big_uint())
    }

    fn deserialize_value(&self, cell: &Arc<Cell>) -> Result<BigUint> {
        cell.parse().load_big_uint(self.value_size)
    }
}

/// How an empty dictionary is represented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashmapKind {
    /// Plain `Hashmap`: serializing an empty map is an error
    Hashmap,
    /// `HashmapE`: a presence bit, then the root edge as a reference
    HashmapE,
}

/// TON Dictionary (HashMap)
#[derive(Debug, Clone)]
pub struct Hashmap<C: DictCodec = RawCodec> {
    entries: BTreeMap<Bits, Arc<Cell>>,
    key_size: usize,
    kind: HashmapKind,
    codec: C,
}

impl Hashmap<RawCodec> {
    /// Creates a dictionary over raw bit keys and cell values
    pub fn new(key_size: usize, kind: HashmapKind) -> Self {
        Self::with_codec(key_size, kind, RawCodec)
    }
}

impl<C: DictCodec> Hashmap<C> {
    pub fn with_codec(key_size: usize, kind: HashmapKind, codec: C) -> Self {
        Self {
            entries: BTreeMap::new(),
            key_size,
            kind,
            codec,
        }
    }

    /// Reads a dictionary from the content of `cell`
    pub fn parse(key_size: usize, kind: HashmapKind, codec: C, cell: &Cell) -> Result<Self> {
        Self::parse_slice(key_size, kind, codec, cell.parse())
    }

    /// Reads a dictionary from a slice holding exactly its serialization
    pub fn parse_slice(
        key_size: usize,
        kind: HashmapKind,
        codec: C,
        mut slice: CellSlice,
    ) -> Result<Self> {
        let mut map = Self::with_codec(key_size, kind, codec);
        let root = match kind {
            HashmapKind::HashmapE => {
                if slice.remaining_bits() != 1 {
                    return Err(TvmError::InvalidCell(format!(
                        "HashmapE expects a single presence bit, got {} bits",
                        slice.remaining_bits()
                    )));
                }
                if !slice.load_bit()? {
                    return Ok(map);
                }
                let root = slice.load_ref()?;
                // a pruned root keeps no entries of its own
                if root.is_exotic() {
                    return Ok(map);
                }
                root.parse()
            }
            HashmapKind::Hashmap => {
                if slice.remaining_bits() < 2 {
                    return Err(TvmError::EmptyHashmap);
                }
                slice
            }
        };

        let mut key = Bits::with_capacity(key_size);
        deserialize_edge(root, key_size, &mut key, &mut map.entries)?;
        Ok(map)
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn kind(&self) -> HashmapKind {
        self.kind
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn serialize_key(&self, key: &C::Key) -> Result<Bits> {
        let bits = self.codec.serialize_key(key)?;
        self.check_key_size(&bits)?;
        Ok(bits)
    }

    fn check_key_size(&self, bits: &Bits) -> Result<()> {
        if bits.len() != self.key_size {
            return Err(TvmError::KeySizeMismatch {
                expected: self.key_size,
                actual: bits.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, key: &C::Key) -> Result<Option<C::Value>> {
        let bits = self.serialize_key(key)?;
        self.entries
            .get(&bits)
            .map(|cell| self.codec.deserialize_value(cell))
            .transpose()
    }

    pub fn contains(&self, key: &C::Key) -> Result<bool> {
        let bits = self.serialize_key(key)?;
        Ok(self.entries.contains_key(&bits))
    }

    /// Inserts or overwrites an entry
    pub fn set(&mut self, key: C::Key, value: C::Value) -> Result<&mut Self> {
        let bits = self.serialize_key(&key)?;
        let cell = self.codec.serialize_value(&value)?;
        self.entries.insert(bits, cell);
        Ok(self)
    }

    /// Inserts only when the key is absent, returns whether it was inserted
    pub fn add(&mut self, key: C::Key, value: C::Value) -> Result<bool> {
        if self.contains(&key)? {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }

    /// Overwrites only when the key is present, returns whether it was replaced
    pub fn replace(&mut self, key: C::Key, value: C::Value) -> Result<bool> {
        if !self.contains(&key)? {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }

    /// Sets the entry and returns the previous value
    pub fn get_set(&mut self, key: C::Key, value: C::Value) -> Result<Option<C::Value>> {
        let previous = self.get(&key)?;
        self.set(key, value)?;
        Ok(previous)
    }

    /// Adds the entry and returns the value that was already there, if any
    pub fn get_add(&mut self, key: C::Key, value: C::Value) -> Result<Option<C::Value>> {
        let previous = self.get(&key)?;
        if previous.is_none() {
            self.set(key, value)?;
        }
        Ok(previous)
    }

    /// Replaces the entry and returns the previous value, if any
    pub fn get_replace(&mut self, key: C::Key, value: C::Value) -> Result<Option<C::Value>> {
        let previous = self.get(&key)?;
        if previous.is_some() {
            self.set(key, value)?;
        }
        Ok(previous)
    }

    /// Removes an entry, returns whether it existed
    pub fn delete(&mut self, key: &C::Key) -> Result<bool> {
        let bits = self.serialize_key(key)?;
        Ok(self.entries.remove(&bits).is_some())
    }

    /// Decoded entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = Result<(C::Key, C::Value)>> + '_ {
        self.entries.iter().map(|(bits, cell)| {
            Ok((
                self.codec.deserialize_key(bits)?,
                self.codec.deserialize_value(cell)?,
            ))
        })
    }

    pub fn get_raw(&self, key: &[bool]) -> Option<&Arc<Cell>> {
        self.entries.get(key)
    }

    pub fn set_raw(&mut self, key: Bits, value: Arc<Cell>) -> Result<&mut Self> {
        self.check_key_size(&key)?;
        self.entries.insert(key, value);
        Ok(self)
    }

    /// Fully independent copy: changing it never affects `self`
    pub fn copy(&self) -> Self
    where
        C: Clone,
    {
        self.clone()
    }

    /// Serializes the dictionary into its canonical cell tree
    pub fn cell(&self) -> Result<Arc<Cell>> {
        match self.kind {
            HashmapKind::Hashmap => self.root_edge(),
            HashmapKind::HashmapE => {
                let mut builder = CellBuilder::new();
                if self.entries.is_empty() {
                    builder.store_bit(false)?;
                } else {
                    builder.store_bit(true)?;
                    builder.store_ref(self.root_edge()?)?;
                }
                builder.build()
            }
        }
    }

    fn root_edge(&self) -> Result<Arc<Cell>> {
        if self.entries.is_empty() {
            return Err(TvmError::EmptyHashmap);
        }
        let nodes: Vec<Node<'_>> = self
            .entries
            .iter()
            .map(|(key, value)| (key.as_slice(), value))
            .collect();
        serialize_edge(&nodes, self.key_size)
    }

    /// Builds a Merkle proof revealing only the paths to `keys`
    ///
    /// Every other subtree is replaced by a pruned branch, so the proof keeps
    /// the level 0 hash of [`Hashmap::cell`].
    pub fn build_merkle_proof(&self, keys: &[C::Key]) -> Result<Arc<Cell>> {
        let mut key_bits = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let bits = self.serialize_key(key)?;
            if !self.entries.contains_key(&bits) {
                return Err(TvmError::MissingKey(index));
            }
            key_bits.push(bits);
        }
        let proved = self.prove(&key_bits)?;
        Ok(Arc::new(Cell::merkle_proof(proved)?))
    }

    /// Builds a Merkle update between the proofs of `key` before and after
    /// setting it to `value`
    pub fn build_merkle_update(&self, key: C::Key, value: C::Value) -> Result<Arc<Cell>>
    where
        C: Clone,
    {
        let bits = self.serialize_key(&key)?;
        if !self.entries.contains_key(&bits) {
            return Err(TvmError::MissingKey(0));
        }
        let old = self.prove(std::slice::from_ref(&bits))?;

        let mut updated = self.copy();
        updated.set(key, value)?;
        let new = updated.prove(std::slice::from_ref(&bits))?;

        Ok(Arc::new(Cell::merkle_update(old, new)?))
    }

    /// Proof body: the serialized dictionary with unrelated subtrees pruned
    fn prove(&self, keys: &[Bits]) -> Result<Arc<Cell>> {
        if self.entries.is_empty() {
            return self.cell();
        }
        let suffixes: Vec<&[bool]> = keys.iter().map(|key| key.as_slice()).collect();
        let root = prove_edge(&self.root_edge()?, self.key_size, &suffixes)?;
        match self.kind {
            HashmapKind::Hashmap => Ok(root),
            HashmapKind::HashmapE => {
                let mut builder = CellBuilder::new();
                builder.store_bit(true)?.store_ref(root)?;
                builder.build()
            }
        }
    }
}

/// Remaining key bits of a sorted node and its value cell
type Node<'a> = (&'a [bool], &'a Arc<Cell>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelForm {
    Short,
    Long,
    Same(bool),
}

/// Width of the length field of long and same labels
fn label_length_bits(max_len: usize) -> usize {
    (usize::BITS - max_len.leading_zeros()) as usize
}

/// Picks the most compact encoding, short wins ties, then long
fn label_form(label: &[bool], max_len: usize) -> LabelForm {
    let n = label.len();
    let k = label_length_bits(max_len);

    let mut form = LabelForm::Short;
    let mut size = 2 * n + 2;
    if 2 + k + n < size {
        form = LabelForm::Long;
        size = 2 + k + n;
    }
    if let Some(&bit) = label.first() {
        if label.iter().all(|&b| b == bit) && 3 + k < size {
            form = LabelForm::Same(bit);
        }
    }
    form
}

fn store_label(builder: &mut CellBuilder, label: &[bool], max_len: usize) -> Result<()> {
    let k = label_length_bits(max_len);
    match label_form(label, max_len) {
        LabelForm::Short => {
            builder.store_bit(false)?;
            for _ in 0..label.len() {
                builder.store_bit(true)?;
            }
            builder.store_bit(false)?;
            builder.store_bits(label)?;
        }
        LabelForm::Long => {
            builder.store_bits(&[true, false])?;
            builder.store_uint(label.len() as u64, k)?;
            builder.store_bits(label)?;
        }
        LabelForm::Same(bit) => {
            builder.store_bits(&[true, true, bit])?;
            builder.store_uint(label.len() as u64, k)?;
        }
    }
    Ok(())
}

fn load_label(slice: &mut CellSlice, max_len: usize) -> Result<Bits> {
    let k = label_length_bits(max_len);
    let label = if !slice.load_bit()? {
        let n = slice.load_unary_length()?;
        check_label_len(n, max_len)?;
        slice.load_bits(n)?
    } else if !slice.load_bit()? {
        let n = slice.load_uint(k)? as usize;
        check_label_len(n, max_len)?;
        slice.load_bits(n)?
    } else {
        let bit = slice.load_bit()?;
        let n = slice.load_uint(k)? as usize;
        check_label_len(n, max_len)?;
        Bits::from(vec![bit; n])
    };
    Ok(label)
}

fn check_label_len(len: usize, max_len: usize) -> Result<()> {
    if len > max_len {
        return Err(TvmError::InvalidLabel(format!(
            "label of {len} bits exceeds the {max_len} remaining key bits"
        )));
    }
    Ok(())
}

/// Serializes sorted, non-empty `nodes` whose keys all have `max_len` bits
fn serialize_edge(nodes: &[Node<'_>], max_len: usize) -> Result<Arc<Cell>> {
    let (first, value) = nodes[0];
    let last = nodes[nodes.len() - 1].0;
    let label_len = first
        .iter()
        .zip(last.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut builder = CellBuilder::new();
    store_label(&mut builder, &first[..label_len], max_len)?;

    if nodes.len() == 1 {
        builder.store_slice(&value.parse())?;
        return builder.build();
    }

    // sorted keys diverge right after the label, so both sides are non-empty
    let split = nodes.partition_point(|(key, _)| !key[label_len]);
    let branch = |part: &[Node<'_>]| -> Result<Arc<Cell>> {
        let stripped: Vec<Node<'_>> = part
            .iter()
            .map(|&(key, value)| (&key[label_len + 1..], value))
            .collect();
        serialize_edge(&stripped, max_len - label_len - 1)
    };
    let left = branch(&nodes[..split])?;
    let right = branch(&nodes[split..])?;
    builder.store_ref(left)?.store_ref(right)?;
    builder.build()
}

fn deserialize_edge(
    mut edge: CellSlice,
    max_len: usize,
    key: &mut Bits,
    entries: &mut BTreeMap<Bits, Arc<Cell>>,
) -> Result<()> {
    let label = load_label(&mut edge, max_len)?;
    let prefix_len = key.len();
    key.extend(label.iter());

    if label.len() == max_len {
        let mut builder = CellBuilder::new();
        builder.store_slice(&edge)?;
        entries.insert(key.clone(), builder.build()?);
    } else {
        let forks = edge.refs();
        if forks.len() > 2 {
            return Err(TvmError::InvalidCell(format!(
                "dictionary fork with {} refs",
                forks.len()
            )));
        }
        let fork_len = key.len();
        for (index, child) in forks.iter().enumerate() {
            // pruned subtrees of a proof are skipped
            if child.is_exotic() {
                continue;
            }
            key.push(index == 1);
            deserialize_edge(child.parse(), max_len - label.len() - 1, key, entries)?;
            key.truncate(fork_len);
        }
    }

    key.truncate(prefix_len);
    Ok(())
}

/// Rebuilds `edge` keeping only the paths of `keys` (suffixes below this edge)
fn prove_edge(edge: &Arc<Cell>, max_len: usize, keys: &[&[bool]]) -> Result<Arc<Cell>> {
    if keys.is_empty() {
        return Ok(Arc::new(Cell::pruned_branch(edge)?));
    }

    let mut slice = edge.parse();
    let label = load_label(&mut slice, max_len)?;
    if label.len() == max_len {
        return Ok(edge.clone());
    }

    let rest = max_len - label.len() - 1;
    let mut children = Vec::with_capacity(edge.refs().len());
    for (index, child) in edge.refs().iter().enumerate() {
        if child.is_exotic() {
            children.push(child.clone());
            continue;
        }
        let branch: Vec<&[bool]> = keys
            .iter()
            .filter(|key| key.len() > label.len() && key[label.len()] == (index == 1))
            .map(|key| &key[label.len() + 1..])
            .collect();
        children.push(prove_edge(child, rest, &branch)?);
    }
    Ok(Arc::new(Cell::ordinary(edge.bits().clone(), children)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::address::Address;
    use crate::tvm::boc;
    use crate::tvm::cell::CellType;
    use rand::Rng;
    use std::collections::BTreeSet;

    fn uint_dict(entries: &[(u64, u64)]) -> Hashmap<UintCodec> {
        let mut dict = Hashmap::with_codec(16, HashmapKind::HashmapE, UintCodec::new(16, 16));
        for &(key, value) in entries {
            dict.set(BigUint::from(key), BigUint::from(value)).unwrap();
        }
        dict
    }

    fn label_bits(label: &[bool], max_len: usize) -> String {
        let mut builder = CellBuilder::new();
        store_label(&mut builder, label, max_len).unwrap();
        builder.bits().to_string()
    }

    /// u32 keys mapped to addresses behind a reference
    #[derive(Debug, Clone, Copy)]
    struct AddressCodec;

    impl DictCodec for AddressCodec {
        type Key = u32;
        type Value = Address;

        fn serialize_key(&self, key: &u32) -> Result<Bits> {
            let mut builder = CellBuilder::new();
            builder.store_uint(*key as u64, 32)?;
            Ok(builder.bits().clone())
        }

        fn serialize_value(&self, value: &Address) -> Result<Arc<Cell>> {
            let mut inner = CellBuilder::new();
            inner.store_address(Some(value))?;
            let mut builder = CellBuilder::new();
            builder.store_ref(inner.build()?)?;
            builder.build()
        }

        fn deserialize_key(&self, bits: &Bits) -> Result<u32> {
            Ok(CellSlice::new(bits.clone(), Vec::new()).load_uint(32)? as u32)
        }

        fn deserialize_value(&self, cell: &Arc<Cell>) -> Result<Address> {
            cell.parse()
                .load_ref()?
                .parse()
                .load_address()?
                .ok_or_else(|| TvmError::InvalidAddress("empty address".to_string()))
        }
    }

    fn address_dict() -> Hashmap<AddressCodec> {
        let mut dict = Hashmap::with_codec(32, HashmapKind::HashmapE, AddressCodec);
        for i in 0..10u8 {
            let mut hash_part = [0u8; 32];
            hash_part[31] = i;
            dict.set(i as u32, Address::new(0, hash_part)).unwrap();
        }
        dict
    }

    #[test]
    fn test_dict_hash() {
        let dict = uint_dict(&[(17, 289), (239, 57121), (32781, 169)]);
        assert_eq!(
            dict.cell().unwrap().hash_hex(),
            "863cdf82df752f65f8386646b1e92770fd3545d726762cae82e3b9a0100c501e"
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = uint_dict(&[(17, 289), (239, 57121), (32781, 169)]);
        let b = uint_dict(&[(32781, 169), (17, 289), (239, 57121)]);
        assert_eq!(a.cell().unwrap().hash(), b.cell().unwrap().hash());
    }

    #[test]
    fn test_label_forms() {
        // empty label at the root of a 16-bit key
        assert_eq!(label_bits(&[], 16), "00");
        // seven zeros out of fifteen: same form
        assert_eq!(label_bits(&[false; 7], 15), "1100111");
        // mixed bits: long beats short
        let mixed = [false, true, true, false, true, true, false, true];
        assert_eq!(label_bits(&mixed, 15), "10100001101101");
        // one bit out of one: short and long tie at four bits
        assert_eq!(label_bits(&[true], 1), "0101");
        assert_eq!(label_form(&[true], 1), LabelForm::Short);
    }

    #[test]
    fn test_label_round_trip() {
        let cases: [(&[bool], usize); 4] = [
            (&[], 0),
            (&[true, true, true, true], 8),
            (&[true, false, true], 3),
            (&[false; 20], 32),
        ];
        for (label, max_len) in cases {
            let mut builder = CellBuilder::new();
            store_label(&mut builder, label, max_len).unwrap();
            let mut slice = builder.to_slice().unwrap();
            assert_eq!(load_label(&mut slice, max_len).unwrap().as_slice(), label);
            assert_eq!(slice.remaining_bits(), 0);
        }
    }

    #[test]
    fn test_label_too_long() {
        let mut builder = CellBuilder::new();
        builder.store_bits(&[true, false]).unwrap();
        builder.store_uint(7, 3).unwrap();
        let mut slice = builder.to_slice().unwrap();
        assert!(matches!(
            load_label(&mut slice, 4),
            Err(TvmError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_parse_round_trip() {
        let dict = uint_dict(&[(17, 289), (239, 57121), (32781, 169)]);
        let cell = dict.cell().unwrap();
        let parsed =
            Hashmap::parse(16, HashmapKind::HashmapE, UintCodec::new(16, 16), &cell).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(
            parsed.get(&BigUint::from(239u32)).unwrap(),
            Some(BigUint::from(57121u32))
        );
        assert_eq!(parsed.get(&BigUint::from(240u32)).unwrap(), None);
        assert_eq!(parsed.cell().unwrap().hash(), cell.hash());

        let entries: Vec<(BigUint, BigUint)> = parsed.iter().map(|e| e.unwrap()).collect();
        let keys: Vec<BigUint> = entries.into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                BigUint::from(17u32),
                BigUint::from(239u32),
                BigUint::from(32781u32)
            ]
        );
    }

    #[test]
    fn test_random_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let key_size = rng.gen_range(1..=24usize);
            let count = rng.gen_range(1..=40usize);
            let mut keys = BTreeSet::new();
            for _ in 0..count {
                keys.insert(rng.gen_range(0..(1u64 << key_size)));
            }

            let mut dict =
                Hashmap::with_codec(key_size, HashmapKind::Hashmap, UintCodec::new(key_size, 8));
            for &key in &keys {
                dict.set(BigUint::from(key), BigUint::from(rng.gen_range(0..=255u8)))
                    .unwrap();
            }

            let cell = dict.cell().unwrap();
            let parsed = Hashmap::parse(
                key_size,
                HashmapKind::Hashmap,
                UintCodec::new(key_size, 8),
                &cell,
            )
            .unwrap();
            assert_eq!(parsed.len(), keys.len());
            for entry in dict.iter() {
                let (key, value) = entry.unwrap();
                assert_eq!(parsed.get(&key).unwrap(), Some(value));
            }
            assert_eq!(parsed.cell().unwrap().hash(), cell.hash());
        }
    }

    #[test]
    fn test_empty_maps() {
        let plain = Hashmap::new(8, HashmapKind::Hashmap);
        assert!(matches!(plain.cell(), Err(TvmError::EmptyHashmap)));

        let dict = Hashmap::new(8, HashmapKind::HashmapE);
        let cell = dict.cell().unwrap();
        assert_eq!(cell.bits().to_string(), "0");
        assert!(cell.refs().is_empty());

        let parsed = Hashmap::parse(8, HashmapKind::HashmapE, RawCodec, &cell).unwrap();
        assert!(parsed.is_empty());

        let empty = Cell::default();
        assert!(matches!(
            Hashmap::parse(8, HashmapKind::Hashmap, RawCodec, &empty),
            Err(TvmError::EmptyHashmap)
        ));
    }

    #[test]
    fn test_zero_width_keys() {
        let mut dict = Hashmap::new(0, HashmapKind::Hashmap);
        let value = CellBuilder::new().build().unwrap();
        dict.set(Bits::new(), value).unwrap();
        let cell = dict.cell().unwrap();
        assert_eq!(cell.bits().to_string(), "00");
        let parsed = Hashmap::parse(0, HashmapKind::Hashmap, RawCodec, &cell).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_key_size_mismatch() {
        let mut dict = Hashmap::new(8, HashmapKind::HashmapE);
        let value = CellBuilder::new().build().unwrap();
        assert!(matches!(
            dict.set_raw(Bits::from(vec![true; 7]), value.clone()),
            Err(TvmError::KeySizeMismatch {
                expected: 8,
                actual: 7
            })
        ));
        assert!(matches!(
            dict.set(Bits::from(vec![true; 9]), value),
            Err(TvmError::KeySizeMismatch { .. })
        ));

        let mut uints = uint_dict(&[]);
        assert!(matches!(
            uints.set(BigUint::from(1u32 << 16), BigUint::from(1u8)),
            Err(TvmError::IntOverflow { .. })
        ));
    }

    #[test]
    fn test_map_operations() {
        let mut dict = uint_dict(&[(1, 10)]);
        let key = |k: u64| BigUint::from(k);

        assert!(dict.contains(&key(1)).unwrap());
        assert!(!dict.add(key(1), key(11)).unwrap());
        assert_eq!(dict.get(&key(1)).unwrap(), Some(key(10)));
        assert!(dict.add(key(2), key(20)).unwrap());

        assert!(!dict.replace(key(3), key(30)).unwrap());
        assert!(!dict.contains(&key(3)).unwrap());
        assert!(dict.replace(key(2), key(21)).unwrap());
        assert_eq!(dict.get(&key(2)).unwrap(), Some(key(21)));

        assert_eq!(dict.get_set(key(2), key(22)).unwrap(), Some(key(21)));
        assert_eq!(dict.get_set(key(4), key(40)).unwrap(), None);
        assert_eq!(dict.get_add(key(4), key(41)).unwrap(), Some(key(40)));
        assert_eq!(dict.get(&key(4)).unwrap(), Some(key(40)));
        assert_eq!(dict.get_add(key(5), key(50)).unwrap(), None);
        assert_eq!(dict.get_replace(key(6), key(60)).unwrap(), None);
        assert!(!dict.contains(&key(6)).unwrap());
        assert_eq!(dict.get_replace(key(5), key(51)).unwrap(), Some(key(50)));

        assert_eq!(dict.len(), 4);
        assert!(dict.delete(&key(1)).unwrap());
        assert!(!dict.delete(&key(1)).unwrap());
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn test_raw_access() {
        let dict = uint_dict(&[(17, 289)]);
        let key = Bits::from_biguint(&BigUint::from(17u32), 16).unwrap();
        let cell = dict.get_raw(&key).unwrap();
        assert_eq!(cell.parse().load_uint(16).unwrap(), 289);
        assert!(dict.get_raw(&Bits::from(vec![false; 16])).is_none());
    }

    #[test]
    fn test_copy_is_independent() {
        let dict = uint_dict(&[(17, 289), (239, 57121)]);
        let hash = dict.cell().unwrap().hash();

        let mut copy = dict.copy();
        copy.set(BigUint::from(1u8), BigUint::from(1u8)).unwrap();
        copy.delete(&BigUint::from(17u8)).unwrap();

        assert_eq!(dict.len(), 2);
        assert_eq!(dict.cell().unwrap().hash(), hash);
        assert_ne!(copy.cell().unwrap().hash(), hash);
    }

    #[test]
    fn test_address_values() {
        let dict = address_dict();
        assert_eq!(
            dict.get(&8).unwrap().unwrap().to_raw(),
            "0:0000000000000000000000000000000000000000000000000000000000000008"
        );
        assert_eq!(
            dict.get(&4).unwrap().unwrap().to_raw(),
            "0:0000000000000000000000000000000000000000000000000000000000000004"
        );
        assert!(dict.get(&44).unwrap().is_none());
        assert!(Hashmap::with_codec(32, HashmapKind::HashmapE, AddressCodec)
            .get(&44)
            .unwrap()
            .is_none());
    }

    fn cell_value(dict: &Hashmap<AddressCodec>, key: u32) -> Option<Arc<Cell>> {
        let bits = AddressCodec.serialize_key(&key).unwrap();
        dict.get_raw(&bits).cloned()
    }

    #[test]
    fn test_merkle_proof() {
        let dict = address_dict();
        let cell = dict.cell().unwrap();
        let proof = dict.build_merkle_proof(&[9, 2, 5, 8, 4]).unwrap();

        assert_eq!(proof.cell_type(), CellType::MerkleProof);
        assert_eq!(proof.level(), 0);
        let body = proof.reference(0).unwrap();
        assert_eq!(body.level(), 1);
        assert_eq!(body.hash_at(0), cell.hash_at(0));
        assert_ne!(body.hash(), cell.hash());

        // the proved leaves are still readable from the proof body
        let partial = Hashmap::parse(32, HashmapKind::HashmapE, RawCodec, body).unwrap();
        for key in [9u32, 2, 5, 8, 4] {
            let bits = Bits::from_biguint(&BigUint::from(key), 32).unwrap();
            assert_eq!(partial.get_raw(&bits), cell_value(&dict, key).as_ref());
        }
    }

    #[test]
    fn test_parse_skips_pruned_branches() {
        let mut dict = Hashmap::with_codec(8, HashmapKind::HashmapE, UintCodec::new(8, 8));
        dict.set(BigUint::from(0u8), BigUint::from(10u8)).unwrap();
        dict.set(BigUint::from(1u8), BigUint::from(11u8)).unwrap();
        let proof = dict.build_merkle_proof(&[BigUint::from(0u8)]).unwrap();
        let body = proof.reference(0).unwrap();

        let partial = Hashmap::parse(8, HashmapKind::HashmapE, UintCodec::new(8, 8), body).unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.get(&BigUint::from(0u8)).unwrap(), Some(BigUint::from(10u8)));
        assert_eq!(partial.get(&BigUint::from(1u8)).unwrap(), None);

        let pruned_root = dict.build_merkle_proof(&[]).unwrap();
        let body = pruned_root.reference(0).unwrap();
        let nothing = Hashmap::parse(8, HashmapKind::HashmapE, UintCodec::new(8, 8), body).unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_merkle_proof_fixture() {
        let mut dict = Hashmap::with_codec(32, HashmapKind::Hashmap, AddressCodec);
        for i in 0..10u8 {
            let mut hash_part = [0u8; 32];
            hash_part[31] = i;
            dict.set(i as u32, Address::new(0, hash_part)).unwrap();
        }
        assert_eq!(
            dict.get(&9).unwrap().unwrap().to_raw(),
            "0:0000000000000000000000000000000000000000000000000000000000000009"
        );

        let proof = dict.build_merkle_proof(&[9, 2, 5, 8, 4]).unwrap();
        let data = boc::serialize(&[proof], &boc::BocOptions::default()).unwrap();
        let roots = boc::deserialize_with(&data, true).unwrap();
        assert_eq!(
            roots[0].hash_hex(),
            "23cdc9a02d51e83c3273cf39ca99b0b4cf4f1445b6cdc59b8ccf4c20bcceed0e"
        );
    }

    #[test]
    fn test_merkle_proof_of_every_key() {
        let dict = address_dict();
        let keys: Vec<u32> = (0..10).collect();
        let proof = dict.build_merkle_proof(&keys).unwrap();
        let body = proof.reference(0).unwrap();
        assert_eq!(body.level(), 0);
        assert_eq!(body.hash(), dict.cell().unwrap().hash());
    }

    #[test]
    fn test_merkle_proof_without_keys() {
        let dict = address_dict();
        let proof = dict.build_merkle_proof(&[]).unwrap();
        let body = proof.reference(0).unwrap();
        assert_eq!(body.refs()[0].cell_type(), CellType::PrunedBranch);
        assert_eq!(body.hash_at(0), dict.cell().unwrap().hash_at(0));

        let empty = Hashmap::with_codec(32, HashmapKind::HashmapE, AddressCodec);
        let proof = empty.build_merkle_proof(&[]).unwrap();
        assert_eq!(proof.reference(0).unwrap().bits().to_string(), "0");
    }

    #[test]
    fn test_merkle_proof_missing_key() {
        let dict = address_dict();
        assert!(matches!(
            dict.build_merkle_proof(&[1, 2, 44]),
            Err(TvmError::MissingKey(2))
        ));
    }

    #[test]
    fn test_merkle_update() {
        let dict = address_dict();
        let before = dict.cell().unwrap();
        let replacement = Address::new(-1, [0xAB; 32]);
        let update = dict.build_merkle_update(3, replacement.clone()).unwrap();

        assert_eq!(update.cell_type(), CellType::MerkleUpdate);
        let old = update.reference(0).unwrap();
        let new = update.reference(1).unwrap();
        assert_eq!(old.hash_at(0), before.hash_at(0));

        let mut changed = dict.copy();
        changed.set(3, replacement).unwrap();
        assert_eq!(new.hash_at(0), changed.cell().unwrap().hash_at(0));

        // the original map is untouched
        assert_eq!(dict.cell().unwrap().hash(), before.hash());
        assert!(matches!(
            dict.build_merkle_update(44, Address::new(0, [0; 32])),
            Err(TvmError::MissingKey(0))
        ));
    }
}
