//! Level mask of a cell
//!
//! Each set bit marks a Merkle level for which the cell keeps a distinct
//! hash and depth.

/// Cell level mask (3 significant bits)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Highest set bit position plus one
    pub fn level(self) -> u8 {
        (u8::BITS - self.0.leading_zeros()) as u8
    }

    pub fn hash_index(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn hash_count(self) -> usize {
        self.hash_index() + 1
    }

    /// Clears every bit at position `level` and above
    pub fn apply(self, level: u8) -> Self {
        if level >= 8 {
            return self;
        }
        Self(self.0 & ((1u8 << level) - 1))
    }

    pub fn is_significant(self, level: u8) -> bool {
        level == 0 || (level <= 8 && (self.0 >> (level - 1)) & 1 == 1)
    }
}

impl From<u8> for LevelMask {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl std::ops::BitOr for LevelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::Shr<u8> for LevelMask {
    type Output = Self;

    fn shr(self, rhs: u8) -> Self {
        Self(self.0 >> rhs)
    }
}
