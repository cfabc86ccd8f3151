use thiserror::Error;

/// Errors produced by the cell engine
#[derive(Debug, Error)]
pub enum TvmError {
    #[error("Bits overflow: cannot store {requested} bits, {available} available")]
    BitsOverflow { requested: usize, available: usize },
    #[error("Refs overflow: cell can not hold more than 4 references")]
    RefsOverflow,
    #[error("Bits underflow: requested {requested} bits, {available} remaining")]
    BitsUnderflow { requested: usize, available: usize },
    #[error("Refs underflow: no more references to read")]
    RefsUnderflow,

    #[error("Invalid cell: {0}")]
    InvalidCell(String),
    #[error("Cell depth {0} exceeds the maximum of 1024")]
    DepthOverflow(u16),

    #[error("Invalid BOC: {0}")]
    InvalidBoc(String),
    #[error("CRC32C mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },
    #[error("Topological order is broken: cell {cell} references {reference}")]
    TopologicalOrder { cell: usize, reference: usize },
    #[error("Invalid fift hex: {0}")]
    InvalidFift(String),
    #[error("Invalid hashmap label: {0}")]
    InvalidLabel(String),
    #[error("Incorrectly augmented bits")]
    InvalidAugmentation,
    #[error("Bits length {len} is not divisible by {divider}")]
    BitsNotAligned { len: usize, divider: usize },
    #[error("Invalid UTF-8 string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Integer {value} does not fit into {bits} bits")]
    IntOverflow { value: String, bits: usize },
    #[error("Coins value can not be negative")]
    NegativeCoins,
    #[error("Invalid coins amount: {0}")]
    InvalidCoins(String),
    #[error("Key #{0} is not present in the hashmap")]
    MissingKey(usize),
    #[error("Key has {actual} bits, expected {expected}")]
    KeySizeMismatch { expected: usize, actual: usize },
    #[error("Hashmap is empty")]
    EmptyHashmap,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Unsupported address flag {0:#04b}")]
    InvalidAddressFlag(u8),
}

pub type Result<T, E = TvmError> = std::result::Result<T, E>;
